use thiserror::Error;

/// Failures from the trade-record store.
///
/// Connection-level failures are transient and retried by the gateway;
/// everything else is returned to the caller untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("store connection unavailable: {0}")]
    Connection(String),

    #[error("store operation timed out: {0}")]
    Timeout(String),

    #[error("open position already exists for {0}")]
    OpenPositionExists(String),

    #[error("no open record {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Partial unique index allowing one open record per token
pub const OPEN_POSITION_INDEX: &str = "trade_performance_one_open_per_token";

impl StoreError {
    /// Whether the failure is worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Timeout(_))
    }

    /// Classify a unique violation by the constraint that fired
    pub fn unique_violation(constraint: Option<&str>, message: &str) -> Self {
        match constraint {
            Some(OPEN_POSITION_INDEX) => StoreError::OpenPositionExists(message.to_string()),
            Some(other) => StoreError::Database(format!("{} (constraint {})", message, other)),
            None => StoreError::Database(message.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut => StoreError::Timeout("connection pool timed out".into()),
            sqlx::Error::PoolClosed => StoreError::Connection("connection pool closed".into()),
            sqlx::Error::WorkerCrashed => StoreError::Connection("database worker crashed".into()),
            sqlx::Error::Tls(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::unique_violation(db.constraint(), db.message())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".into()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Corrupt(err.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Database(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Failures from external collaborators (market data, simulation, execution, wallet)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("{service} rate limited the request (HTTP 429)")]
    RateLimited { service: String },

    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{service} unreachable: {message}")]
    Unavailable { service: String, message: String },

    #[error("{service} sent an invalid response: {message}")]
    InvalidResponse { service: String, message: String },
}

impl ServiceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ServiceError::RateLimited { .. })
    }

    pub(crate) fn unavailable(service: &str, err: impl std::fmt::Display) -> Self {
        ServiceError::Unavailable {
            service: service.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid(service: &str, err: impl std::fmt::Display) -> Self {
        ServiceError::InvalidResponse {
            service: service.to_string(),
            message: err.to_string(),
        }
    }
}

/// Error surfaced by one evaluation cycle for one token.
///
/// None of these are fatal to the driver; the cycle is logged and the
/// token is picked up again on its next scheduled pass.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("market data unavailable for {token}: {reason}")]
    MarketData { token: String, reason: String },

    #[error("trade store failure: {0}")]
    Store(#[from] StoreError),

    #[error("external service failure: {0}")]
    Service(#[from] ServiceError),
}

impl EngineError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, EngineError::Service(e) if e.is_rate_limited())
    }
}
