//! Deployment option management.
//!
//! # Data Flow
//! ```text
//! options file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DeploymentOptions (validated, immutable)
//!     → read by every cluster generator for one generation cycle
//! ```
//!
//! # Design Decisions
//! - Options are immutable once loaded; a new cycle takes a new snapshot
//! - All fields have defaults to allow minimal files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::DeploymentOptions;
pub use schema::ImpersonationCredentials;
