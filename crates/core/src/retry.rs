use std::future::Future;
use std::time::Duration;

use crate::error::{ScreenError, StoreError};

/// Bounded retry applied at each store call site.
///
/// Every attempt is capped by `timeout`. Retryable failures wait a fixed `backoff`
/// before the next attempt; anything else is returned straight away.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(
        &self,
        stage: &'static str,
        subject: &str,
        mut op: F,
    ) -> Result<T, ScreenError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let res = match tokio::time::timeout(self.timeout, op()).await {
                Ok(res) => res,
                Err(_) => Err(StoreError::Timeout(self.timeout)),
            };

            match res {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        stage,
                        %subject,
                        attempt,
                        backoff = ?self.backoff,
                        error = %err,
                        "store call failed; retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(err) => {
                    return Err(ScreenError::Store {
                        stage,
                        subject: subject.to_string(),
                        source: err,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let out = fast(3)
            .run("read_price_history", "AAA", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(StoreError::Transient("connection reset".into()))
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = fast(2)
            .run("read_price_history", "AAA", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(StoreError::Transient("down".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err, ScreenError::Store { stage: "read_price_history", .. }));
    }

    #[tokio::test]
    async fn does_not_retry_query_errors() {
        let calls = AtomicU32::new(0);
        let res = fast(3)
            .run("write_reports", "2024-01-02", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(StoreError::Query("syntax error".into()))
            })
            .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff: Duration::from_millis(1),
            timeout: Duration::from_millis(10),
        };
        let err = policy
            .run("read_universe", "all", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScreenError::Store {
                source: StoreError::Timeout(_),
                ..
            }
        ));
    }
}
