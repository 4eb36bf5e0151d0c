//! Cluster generation engine.
//!
//! # Data Flow
//! ```text
//! ServiceDefinition + DeploymentOptions
//!     → factory.rs (which generators does this cycle need?)
//!     → generator.rs (one ClusterGenerator per upstream)
//!         → uri.rs / tls.rs / dns.rs / health.rs / backend.rs (leaf builders)
//!     → ClusterDescriptor list
//!     → dedup by name, first wins
//! ```
//!
//! # Design Decisions
//! - Generators are a closed enum; adding an upstream class is a compile-checked change
//! - Any generator error aborts the whole cycle
//! - Every cycle builds fresh generators; nothing is cached between cycles

pub mod backend;
pub mod descriptor;
pub mod dns;
pub mod factory;
pub mod generator;
pub mod health;
pub mod oidc;
pub mod tls;
pub mod uri;

pub use descriptor::ClusterDescriptor;
pub use factory::{generate_clusters, make_cluster_generators};
pub use generator::ClusterGenerator;
pub use oidc::{HttpOpenIdDiscovery, OpenIdDiscovery};
