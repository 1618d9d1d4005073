//! Resilience patterns for metricgate
//!
//! Bounded retry with configurable backoff, used by the batching engine when
//! a sink reports a transient failure. Retries never run forever: every policy
//! carries a maximum attempt count.

pub mod backoff;
pub mod retry;

// Re-export commonly used types
pub use backoff::{BackoffCalculator, BackoffStrategy};
pub use retry::{RetryError, RetryExecutor, RetryPolicy, Retryable};
