//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Remote read fails:
//!     → error class decides: retryable (network) or terminal (everything else)
//!     → backoff.rs sleeps an exponentially growing, jittered delay
//!     → caller's deadline bounds the whole loop
//! ```

pub mod backoff;

pub use backoff::{calculate_backoff, retry_with_backoff, BackoffConfig};
