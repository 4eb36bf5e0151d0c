//! URI and backend-protocol parsing.

use std::fmt;

use url::{Host, Url};

use crate::error::{ControlPlaneError, Result};

/// Scheme, host, port and path of an upstream address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Path without its trailing slash; empty for a bare authority.
    pub path: String,
}

impl ParsedUri {
    /// "host:port", the form used in cluster names.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }
}

/// Parse an upstream URI. A missing scheme means https.
pub fn parse_uri(uri: &str) -> Result<ParsedUri> {
    let with_scheme = if uri.contains("://") {
        uri.to_string()
    } else {
        format!("https://{}", uri)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| ControlPlaneError::policy(format!("error parsing uri {:?}: {}", uri, e)))?;

    let host = match url.host() {
        Some(Host::Domain(d)) => d.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => {
            return Err(ControlPlaneError::policy(format!("uri {:?} has no host", uri)));
        }
    };

    let scheme = url.scheme().to_string();
    let port = url.port().unwrap_or_else(|| default_port(&scheme));
    let path = url.path().trim_end_matches('/').to_string();

    Ok(ParsedUri { scheme, host, port, path })
}

/// Extract "host:port" from a URI.
pub fn extract_address(uri: &str) -> Result<String> {
    parse_uri(uri).map(|u| u.address())
}

fn default_port(scheme: &str) -> u16 {
    match scheme {
        "https" | "grpcs" | "http2s" => 443,
        _ => 80,
    }
}

/// Wire protocol spoken to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendProtocol {
    Http1,
    Http2,
    Grpc,
}

impl BackendProtocol {
    /// GRPC and HTTP2 both need the HTTP/2 codec upstream.
    pub fn is_http2(self) -> bool {
        matches!(self, Self::Http2 | Self::Grpc)
    }
}

impl fmt::Display for BackendProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http1 => write!(f, "HTTP1"),
            Self::Http2 => write!(f, "HTTP2"),
            Self::Grpc => write!(f, "GRPC"),
        }
    }
}

/// Map a URI scheme to a protocol and TLS flag.
///
/// A trailing `s` means TLS. `protocol_hint` ("h2" or "http/1.1") only
/// applies to http/https schemes.
pub fn parse_backend_protocol(scheme: &str, protocol_hint: &str) -> Result<(BackendProtocol, bool)> {
    let scheme = scheme.to_ascii_lowercase();
    let (base, use_tls) = match scheme.strip_suffix('s') {
        Some(base) => (base, true),
        None => (scheme.as_str(), false),
    };

    let protocol = match base {
        "http" => match protocol_hint {
            "" | "http/1.1" => BackendProtocol::Http1,
            "h2" => BackendProtocol::Http2,
            other => {
                return Err(ControlPlaneError::policy(format!(
                    "unknown backend protocol {:?}, should be one of \"http/1.1\" or \"h2\"",
                    other
                )));
            }
        },
        "http2" => BackendProtocol::Http2,
        "grpc" => BackendProtocol::Grpc,
        _ => {
            return Err(ControlPlaneError::policy(format!(
                "unknown backend scheme [{}], should be one of \"http(s)\", \"grpc(s)\" or \"http2(s)\"",
                scheme
            )));
        }
    };

    Ok((protocol, use_tls))
}
