//! Upstream TLS transport sockets.

use crate::clusters::descriptor::{
    CommonTlsContext, DataSource, TlsCertificate, TlsParams, TransportSocket, UpstreamTlsContext,
    ValidationContext, TLS_TRANSPORT_SOCKET_NAME, UPSTREAM_TLS_CONTEXT_TYPE,
};
use crate::config::DeploymentOptions;
use crate::error::{ControlPlaneError, Result};

const DEFAULT_CLIENT_SSL_FILENAME: &str = "client";
const LEGACY_CLIENT_SSL_FILENAME: &str = "backend";
const LEGACY_SSL_DIR: &str = "/etc/nginx/ssl";

/// Certificate material for one class of upstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterTls {
    pub root_certs_path: String,
    pub client_certs_path: String,
    pub cipher_suites: String,
}

impl ClusterTls {
    /// TLS for control-plane side streams: roots only.
    pub fn sidestream(opts: &DeploymentOptions) -> Self {
        Self {
            root_certs_path: opts.ssl_sidestream_client_root_certs_path.clone(),
            ..Default::default()
        }
    }

    /// TLS for backends: roots plus optional client cert and ciphers.
    pub fn backend(opts: &DeploymentOptions) -> Self {
        Self {
            root_certs_path: opts.ssl_backend_client_root_certs_path.clone(),
            client_certs_path: opts.ssl_backend_client_cert_path.clone(),
            cipher_suites: opts.ssl_backend_client_cipher_suites.clone(),
        }
    }

    pub fn transport_socket(&self, sni: &str, alpn_protocols: &[&str]) -> Result<TransportSocket> {
        if self.root_certs_path.is_empty() {
            return Err(ControlPlaneError::policy("root certs path cannot be empty"));
        }

        let mut common = CommonTlsContext {
            validation_context: Some(ValidationContext {
                trusted_ca: DataSource::file(&self.root_certs_path),
            }),
            alpn_protocols: alpn_protocols.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        };

        if !self.client_certs_path.is_empty() {
            let name = if self.client_certs_path.contains(LEGACY_SSL_DIR) {
                LEGACY_CLIENT_SSL_FILENAME
            } else {
                DEFAULT_CLIENT_SSL_FILENAME
            };
            let dir = self.client_certs_path.trim_end_matches('/');
            common.tls_certificates = vec![TlsCertificate {
                certificate_chain: DataSource::file(format!("{}/{}.crt", dir, name)),
                private_key: DataSource::file(format!("{}/{}.key", dir, name)),
            }];
        }

        if !self.cipher_suites.is_empty() {
            common.tls_params = Some(TlsParams {
                cipher_suites: self
                    .cipher_suites
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            });
        }

        Ok(TransportSocket {
            name: TLS_TRANSPORT_SOCKET_NAME.to_string(),
            typed_config: UpstreamTlsContext {
                type_url: UPSTREAM_TLS_CONTEXT_TYPE.to_string(),
                sni: sni.to_string(),
                common_tls_context: common,
            },
        })
    }
}
