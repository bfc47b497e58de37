use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised by a [`crate::storage::ScreenerStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection, pool or I/O level failure. Safe to retry.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The call did not finish within the retry policy timeout.
    #[error("store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The query itself was rejected (bad SQL, constraint violation, ...).
    #[error("store query failed: {0}")]
    Query(String),

    /// A row could not be mapped onto a domain type.
    #[error("failed to decode {table} row: {detail}")]
    Decode { table: &'static str, detail: String },
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Tls(_) => Self::Transient(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Decode {
                table: "unknown",
                detail: err.to_string(),
            },
            other => Self::Query(other.to_string()),
        }
    }
}

/// Screening pipeline errors.
///
/// `InsufficientHistory` and `MissingBar` are data-quality skips: the ticker is left out of
/// the day's cross-section and the run continues. `UnknownCriterion` and `Configuration`
/// point at a caller bug and are surfaced immediately.
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("{ticker}: {bars} bars as of {as_of}, need at least {required}")]
    InsufficientHistory {
        ticker: String,
        as_of: NaiveDate,
        bars: usize,
        required: usize,
    },

    #[error("{ticker}: no price bar on or before {as_of}")]
    MissingBar { ticker: String, as_of: NaiveDate },

    #[error("unknown criterion: {0}")]
    UnknownCriterion(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("{stage} failed for {subject}: {source}")]
    Store {
        stage: &'static str,
        subject: String,
        #[source]
        source: StoreError,
    },

    /// The blocking criteria pass panicked or was aborted.
    #[error("criteria worker failed: {0}")]
    Worker(String),

    #[error("run cancelled")]
    Cancelled,
}

impl ScreenError {
    /// Data-quality conditions that drop a ticker without failing it.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::InsufficientHistory { .. } | Self::MissingBar { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_retryable() {
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(StoreError::Timeout(std::time::Duration::from_secs(1)).is_retryable());
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_retryable());
    }

    #[test]
    fn skip_classification() {
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let skip = ScreenError::InsufficientHistory {
            ticker: "AAA".into(),
            as_of,
            bars: 10,
            required: 252,
        };
        assert!(skip.is_skip());
        assert!(!ScreenError::UnknownCriterion("foo".into()).is_skip());
    }
}
