//! Service definition and rollout models.
//!
//! The definition is authored elsewhere and treated as opaque apart from
//! the handful of fields cluster generation reads. Unknown fields are
//! ignored so a FULL-view definition deserializes cleanly.

pub mod definition;
pub mod rollout;

pub use definition::{AuthProvider, BackendRule, ServiceDefinition};
pub use rollout::{Rollout, TrafficSplit};
