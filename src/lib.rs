//! Sidecar proxy control plane library.

pub mod bootstrap;
pub mod clusters;
pub mod config;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod rollout;
pub mod service;

pub use clusters::{generate_clusters, ClusterDescriptor};
pub use config::DeploymentOptions;
pub use error::{ControlPlaneError, Result};
pub use rollout::{RolloutController, ServiceDefinitionFetcher};
pub use service::ServiceDefinition;
