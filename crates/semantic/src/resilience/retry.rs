//! Exponential backoff for transient embedding API failures.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// How many times, and how patiently, a failed API call is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each subsequent one.
    #[serde(with = "crate::serde_millis")]
    pub base_delay: Duration,
    /// Upper bound for a single delay (before jitter).
    #[serde(with = "crate::serde_millis")]
    pub max_delay: Duration,
    /// Add up to 50% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after the given zero-based failed attempt.
    pub(crate) fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exponential = base.saturating_mul(2_u64.saturating_pow(attempt));
        let capped = exponential.min(self.max_delay.as_millis() as u64);

        if self.jitter && capped > 0 {
            Duration::from_millis(capped + fastrand::u64(0..=capped / 2))
        } else {
            Duration::from_millis(capped)
        }
    }
}

/// Outcome of a retried operation.
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    pub result: Result<T, String>,
    /// Attempts made, including the first (1 = no retry needed).
    pub attempts: u32,
    pub total_duration: Duration,
}

impl<T> RetryResult<T> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, String> {
        self.result
    }
}

/// Run `operation` until it succeeds, a non-retryable error is returned,
/// or `config.max_retries` retries have been spent.
///
/// The closure receives the zero-based attempt number.
pub async fn execute_with_retry_async<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> RetryResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                };
            }
            Err(error) => {
                if attempt >= config.max_retries || !is_retryable_error(&error) {
                    return RetryResult {
                        result: Err(error),
                        attempts: attempt + 1,
                        total_duration: start.elapsed(),
                    };
                }

                let delay = config.delay_for(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, %error, "retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Whether an error message describes a transient condition.
///
/// Unknown errors are treated as retryable; client errors (4xx other than
/// 408/429) and malformed payloads are not.
pub fn is_retryable_error(error: &str) -> bool {
    let lower = error.to_lowercase();

    const TRANSIENT: [&str; 10] = [
        "timeout",
        "timed out",
        "connection",
        "reset",
        "temporarily",
        "unavailable",
        "502",
        "503",
        "504",
        "429",
    ];
    if TRANSIENT.iter().any(|needle| lower.contains(needle)) || lower.contains("408") {
        return true;
    }

    const PERMANENT: [&str; 6] = ["400", "401", "403", "404", "invalid", "not found"];
    if PERMANENT.iter().any(|needle| lower.contains(needle)) {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig::default()
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    #[tokio::test]
    async fn retry_succeeds_eventually() {
        let calls = AtomicU32::new(0);
        let result = execute_with_retry_async(&fast().with_max_retries(3), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("connection reset".to_string())
                } else {
                    Ok("embedded")
                }
            }
        })
        .await;

        assert!(result.succeeded());
        assert_eq!(result.attempts, 3);
        assert_eq!(result.into_result().unwrap(), "embedded");
    }

    #[tokio::test]
    async fn retry_gives_up_after_budget() {
        let result: RetryResult<()> =
            execute_with_retry_async(&fast().with_max_retries(2), |_| async {
                Err("HTTP error 503".to_string())
            })
            .await;

        assert!(!result.succeeded());
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let result: RetryResult<()> =
            execute_with_retry_async(&fast().with_max_retries(5), |_| async {
                Err("HTTP error 401 Unauthorized".to_string())
            })
            .await;

        assert_eq!(result.attempts, 1);
        assert!(result.into_result().unwrap_err().contains("401"));
    }

    #[test]
    fn delay_doubles_and_caps() {
        let cfg = RetryConfig::default()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(300))
            .with_jitter(false);
        assert_eq!(cfg.delay_for(0), Duration::from_millis(100));
        assert_eq!(cfg.delay_for(1), Duration::from_millis(200));
        assert_eq!(cfg.delay_for(2), Duration::from_millis(300));
        assert_eq!(cfg.delay_for(40), Duration::from_millis(300));
    }

    #[test]
    fn jitter_stays_within_half() {
        let cfg = RetryConfig::default()
            .with_base_delay(Duration::from_millis(100))
            .with_jitter(true);
        for _ in 0..50 {
            let d = cfg.delay_for(0);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn retryable_detection() {
        assert!(is_retryable_error("request timed out"));
        assert!(is_retryable_error("HTTP error 429 Too Many Requests"));
        assert!(is_retryable_error("something odd"));
        assert!(!is_retryable_error("HTTP error 400 Bad Request"));
        assert!(!is_retryable_error("invalid api key"));
    }

    #[test]
    fn config_reads_millis() {
        let cfg: RetryConfig =
            serde_json::from_str(r#"{ "max_retries": 1, "base_delay": 250 }"#).unwrap();
        assert_eq!(cfg.max_retries, 1);
        assert_eq!(cfg.base_delay, Duration::from_millis(250));
        assert_eq!(cfg.max_delay, Duration::from_secs(5));
    }
}
