use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key of the HTTP sub-rule in `BackendRule::overrides_by_request_protocol`.
pub const HTTP_BACKEND_PROTOCOL_KEY: &str = "http";

/// Selector prefix shared by discovery API methods.
pub const DISCOVERY_API_PREFIX: &str = "google.discovery";

/// One API surface: its name, auth providers, backend routing and control endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceDefinition {
    pub name: String,
    pub id: String,
    pub control: Control,
    pub authentication: Authentication,
    pub backend: Backend,
}

impl ServiceDefinition {
    /// Service control endpoint declared by the definition, if any.
    pub fn control_environment(&self) -> &str {
        &self.control.environment
    }

    pub fn providers(&self) -> &[AuthProvider] {
        &self.authentication.providers
    }

    pub fn backend_rules(&self) -> &[BackendRule] {
        &self.backend.rules
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Control {
    pub environment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Authentication {
    pub providers: Vec<AuthProvider>,
}

/// A JWT issuer accepted by the API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthProvider {
    pub id: String,
    pub issuer: String,
    pub jwks_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Backend {
    pub rules: Vec<BackendRule>,
}

/// Routing for the methods matched by `selector`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendRule {
    pub selector: String,
    pub address: String,
    /// Optional protocol hint ("h2", "http/1.1") for http/https addresses.
    pub protocol: String,
    pub overrides_by_request_protocol: BTreeMap<String, BackendRule>,
}

impl BackendRule {
    pub fn is_discovery_api(&self) -> bool {
        self.selector.starts_with(DISCOVERY_API_PREFIX)
    }

    /// The HTTP sub-rule, inheriting this rule's selector.
    pub fn http_override(&self) -> Option<BackendRule> {
        self.overrides_by_request_protocol
            .get(HTTP_BACKEND_PROTOCOL_KEY)
            .map(|rule| BackendRule {
                selector: self.selector.clone(),
                ..rule.clone()
            })
    }
}
