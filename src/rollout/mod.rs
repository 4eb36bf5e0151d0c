//! Rollout synchronization.
//!
//! # Data Flow
//! ```text
//! every interval:
//!     service control report → latest rollout id
//!     → same as stored? nothing to do
//!     → different? store it, invoke the owner's callback
//!
//! owner's callback:
//!     service management rollout → traffic split
//!     → highest-traffic config id (first seen wins ties)
//!     → already applied? None
//!     → otherwise fetch the FULL definition
//! ```
//!
//! # Design Decisions
//! - The stored id starts empty, so the first observed id is a change;
//!   an owner that applied a rollout at startup seeds it up front
//! - Poll errors are logged and the loop keeps going
//! - The callback is not retried by the controller

pub mod controller;
pub mod fetcher;

pub use controller::{LatestRolloutIdSource, PollOutcome, RolloutController, ServiceControlRolloutIdSource};
pub use fetcher::{select_config_id, ServiceDefinitionFetcher};
