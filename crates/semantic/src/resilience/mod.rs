//! Retry and circuit breaking around the remote embedding endpoint.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerManager, CircuitState,
};
pub use retry::{execute_with_retry_async, is_retryable_error, RetryConfig, RetryResult};
