//! Retrying agent and API calls on transient failures

use std::{future::Future, time::Duration};

use tracing::{debug, warn};

use crate::{
    config::ClientConfig,
    error::{Result, ScannerError},
};

/// Longest pause between two attempts
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Doubling delay between attempts, capped at [`MAX_DELAY`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub retries: u32,
    pub first_delay: Duration,
}

impl Backoff {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            retries: config.retry_count,
            first_delay: config.retry_delay,
        }
    }

    /// Pause before retry number `retry` (zero based)
    pub fn delay(&self, retry: u32) -> Duration {
        self.first_delay
            .checked_mul(1u32.checked_shl(retry).unwrap_or(u32::MAX))
            .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
    }

    /// Run `operation` until it succeeds, fails for good, or runs out of retries
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            let err = match operation().await {
                Ok(value) => {
                    if retry > 0 {
                        debug!(retries = retry, "Call succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };
            if retry == self.retries {
                warn!(error = %err, attempts = retry + 1, "Giving up");
                return Err(ScannerError::RetryLimitExceeded {
                    attempts: retry + 1,
                });
            }
            let delay = self.delay(retry);
            warn!(error = %err, attempt = retry + 1, ?delay, "Call failed, retrying");
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn unavailable() -> ScannerError {
        ScannerError::HttpStatus {
            status: reqwest::StatusCode::BAD_GATEWAY,
            message: "down".to_string(),
        }
    }

    fn quick(retries: u32) -> Backoff {
        Backoff {
            retries,
            first_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let backoff = Backoff {
            retries: 3,
            first_delay: Duration::from_millis(500),
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(500));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(10), MAX_DELAY);
        assert_eq!(backoff.delay(40), MAX_DELAY);
    }

    #[test]
    fn test_from_config() {
        let backoff = Backoff::from_config(&ClientConfig::fast());
        assert_eq!(backoff.retries, 0);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = quick(2)
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(unavailable())
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let result = quick(2).run(|| async { Err::<i32, _>(unavailable()) }).await;
        assert!(matches!(
            result,
            Err(ScannerError::RetryLimitExceeded { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn test_permanent_error_is_returned_at_once() {
        let calls = AtomicU32::new(0);
        let result = quick(5)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(ScannerError::InvalidUrl("bad".to_string()))
            })
            .await;
        assert!(matches!(result, Err(ScannerError::InvalidUrl(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
