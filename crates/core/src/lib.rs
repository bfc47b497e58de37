pub mod breadth;
pub mod criteria;
pub mod domain;
pub mod error;
pub mod retry;
pub mod rs;
pub mod screener;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    use crate::retry::RetryPolicy;

    const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_STORE_RETRIES: u32 = 3;
    const DEFAULT_STORE_BACKOFF_MS: u64 = 1_000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub store_timeout: Duration,
        pub store_retries: u32,
        pub store_backoff: Duration,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let store_timeout_secs = env_parse("STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS);
            let store_retries = env_parse("STORE_RETRIES", DEFAULT_STORE_RETRIES);
            let store_backoff_ms = env_parse("STORE_RETRY_BACKOFF_MS", DEFAULT_STORE_BACKOFF_MS);

            anyhow::ensure!(store_retries >= 1, "STORE_RETRIES must be >= 1");

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                store_timeout: Duration::from_secs(store_timeout_secs),
                store_retries,
                store_backoff: Duration::from_millis(store_backoff_ms),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy {
                max_attempts: self.store_retries,
                backoff: self.store_backoff,
                timeout: self.store_timeout,
            }
        }
    }

    /// Reads `key` and parses it, keeping `default` when unset or unparsable.
    pub fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }
}
