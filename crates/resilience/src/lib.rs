// crates/resilience/src/lib.rs
//! Retry with exponential backoff
//!
//! # Example
//!
//! ```rust
//! use reparto_resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::with_retries(3, Duration::from_secs(30));
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(60));
//! ```

mod error;
mod retry;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::{with_retry, RetryPolicy, MAX_BACKOFF};
