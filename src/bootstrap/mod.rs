//! Remote bootstrap acquisition.
//!
//! # Data Flow
//! ```text
//! object store (bucket/object)
//!     → read with exponential backoff, bounded by one deadline
//!     → metadata server: project, zone, platform
//!     → transform.rs: listener port override + gcp_attributes injection
//!     → local file handed to the proxy by path
//! ```
//!
//! # Design Decisions
//! - A deadline hit while reading is terminal; other read errors are retried
//! - Transform edits fail closed; nothing is written on a shape mismatch

pub mod fetch;
pub mod storage;
pub mod transform;

pub use fetch::{fetch_config_from_store, read_with_retry, write_bootstrap, FetchConfigOptions};
pub use storage::{GcsObjectStore, ObjectStore};
pub use transform::transform_bootstrap;
