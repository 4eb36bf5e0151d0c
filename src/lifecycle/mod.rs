//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → mpsc channel → supervisor
//!
//! Supervision (supervisor.rs):
//!     spawn proxy → wait for (exit | signal)
//!         exit first   → error, whatever the status
//!         signal first → relay to proxy → wait up to terminate timeout
//!                      → exit is still an error; no exit is a timeout error
//! ```
//!
//! # Design Decisions
//! - The proxy is expected to run forever; any exit on its own is fatal
//! - No forced kill after the terminate timeout; an outer watchdog owns that.
//!   The child is still killed if the supervising task is dropped

pub mod signals;
pub mod supervisor;

pub use signals::forward_os_signals;
pub use supervisor::{envoy_args, start_envoy_and_wait, supervise, StartEnvoyOptions};
