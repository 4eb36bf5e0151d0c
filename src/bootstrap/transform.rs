//! Structural edits applied to the fetched bootstrap.
//!
//! The document is edited as a JSON tree so fields this crate does not
//! model pass through untouched. Both edits fail closed when the
//! expected shape is missing.

use serde_json::Value;

use crate::credentials::GcpAttributes;
use crate::error::{ControlPlaneError, Result};

pub const HTTP_CONNECTION_MANAGER_FILTER: &str = "envoy.filters.network.http_connection_manager";
pub const SERVICE_CONTROL_FILTER: &str = "com.google.espv2.filters.http.service_control";

/// Apply the listener port override (0 keeps the fetched port) and inject
/// the platform attributes into the service control filter.
pub fn transform_bootstrap(config: &[u8], want_port: u16, attrs: &GcpAttributes) -> Result<Vec<u8>> {
    let mut bootstrap: Value = serde_json::from_slice(config)
        .map_err(|e| ControlPlaneError::structural(format!("bootstrap is not valid JSON: {}", e)))?;

    let listener = single_listener(&mut bootstrap)?;
    if want_port != 0 {
        replace_listener_port(listener, want_port)?;
    }

    let filter_config = service_control_config(listener)?;
    add_gcp_attributes(filter_config, attrs)?;

    Ok(serde_json::to_vec_pretty(&bootstrap)?)
}

fn single_listener(bootstrap: &mut Value) -> Result<&mut Value> {
    let listeners = bootstrap
        .pointer_mut("/static_resources/listeners")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ControlPlaneError::structural("bootstrap has no static_resources.listeners"))?;

    match listeners.as_mut_slice() {
        [listener] => Ok(listener),
        other => Err(ControlPlaneError::structural(format!(
            "expected exactly 1 listener, got: {}",
            other.len()
        ))),
    }
}

fn replace_listener_port(listener: &mut Value, port: u16) -> Result<()> {
    let socket_address = listener
        .pointer_mut("/address/socket_address")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| ControlPlaneError::structural("listener contains no socket_address"))?;

    if socket_address.contains_key("named_port") {
        return Err(ControlPlaneError::structural(format!(
            "could not set port {}: listener uses a named port",
            port
        )));
    }
    socket_address.insert("port_value".to_string(), Value::from(port));
    Ok(())
}

/// The service control filter's `typed_config` inside the listener's
/// HTTP connection manager.
fn service_control_config(listener: &mut Value) -> Result<&mut serde_json::Map<String, Value>> {
    let chains = listener
        .get_mut("filter_chains")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ControlPlaneError::structural("listener has no filter_chains"))?;

    let hcm = chains
        .iter_mut()
        .filter_map(|chain| chain.get_mut("filters").and_then(Value::as_array_mut))
        .flatten()
        .find(|f| f.get("name").and_then(Value::as_str) == Some(HTTP_CONNECTION_MANAGER_FILTER))
        .ok_or_else(|| ControlPlaneError::structural("failed to find HTTPConnectionManager on the listener"))?;

    let http_filters = hcm
        .pointer_mut("/typed_config/http_filters")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| ControlPlaneError::structural("HTTPConnectionManager has no http_filters"))?;

    http_filters
        .iter_mut()
        .find(|f| f.get("name").and_then(Value::as_str) == Some(SERVICE_CONTROL_FILTER))
        .and_then(|f| f.get_mut("typed_config"))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| ControlPlaneError::structural("failed to find the service control filter config"))
}

fn add_gcp_attributes(config: &mut serde_json::Map<String, Value>, attrs: &GcpAttributes) -> Result<()> {
    let mut attrs = attrs.clone();

    let existing_platform = config
        .get("gcp_attributes")
        .and_then(|a| a.get("platform"))
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty());
    if let Some(platform) = existing_platform {
        attrs.platform = platform.to_string();
    }

    config.insert("gcp_attributes".to_string(), serde_json::to_value(&attrs)?);
    Ok(())
}
