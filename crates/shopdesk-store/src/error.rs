//! # Store Error Types
//!
//! Everything the remote boundary can report, plus the classification the
//! retry loop in `shopdesk-data` relies on.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  backend failure (sqlx::Error, HTTP client error, auth rejection)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ──► retry_class()                            │
//! │       │                         ├── Transient  → retried with backoff   │
//! │       │                         ├── Cancelled  → surfaced immediately   │
//! │       │                         └── Permanent  → surfaced immediately   │
//! │       ▼                                                                 │
//! │  DataError → ApiError → UI                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Remote store and auth failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row with this id in the resource.
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// Duplicate id or uniqueness key.
    ///
    /// ## When This Occurs
    /// - Second cash session for the same user and day
    /// - Signing up an email that is already registered
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The connection dropped or could not be established.
    #[error("Network error: {0}")]
    Network(String),

    /// The request was aborted in flight.
    #[error("Request aborted: {0}")]
    Aborted(String),

    /// The caller cancelled the request. Never retried.
    #[error("Request cancelled")]
    Cancelled,

    /// Any other error reported by the backend.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Rejected credentials or missing session.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A row could not be converted to or from a model type.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Local database failure (SQLite backend).
    #[error("Database error: {0}")]
    Database(String),
}

/// How the retry loop should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Transient,
    Cancelled,
    Permanent,
}

/// Messages backends attach to network-level failures that were not typed
/// as such by the client library.
const TRANSIENT_PHRASES: &[&str] = &[
    "failed to fetch",
    "networkerror",
    "network request failed",
    "connection reset",
    "aborterror",
    "aborted",
];

/// True when `message` looks like a dropped or aborted request.
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

impl StoreError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn retry_class(&self) -> RetryClass {
        match self {
            StoreError::Network(_) | StoreError::Aborted(_) => RetryClass::Transient,
            StoreError::Cancelled => RetryClass::Cancelled,
            StoreError::Backend(msg) if is_transient_message(msg) => RetryClass::Transient,
            _ => RetryClass::Permanent,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Convert sqlx errors to StoreError.
///
/// ```text
/// sqlx::Error::Database (UNIQUE)  → StoreError::Conflict
/// sqlx::Error::Io                 → StoreError::Network
/// sqlx::Error::PoolTimedOut       → StoreError::Network
/// Other                           → StoreError::Database
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("UNIQUE constraint failed") {
                    StoreError::Conflict(msg.to_string())
                } else {
                    StoreError::Database(msg.to_string())
                }
            }
            sqlx::Error::Io(io) => StoreError::Network(io.to_string()),
            sqlx::Error::PoolTimedOut => StoreError::Network("connection pool timed out".to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Database(format!("migration failed: {err}"))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_network_errors_are_transient() {
        assert_eq!(StoreError::Network("reset".into()).retry_class(), RetryClass::Transient);
        assert_eq!(StoreError::Aborted("timeout".into()).retry_class(), RetryClass::Transient);
    }

    #[test]
    fn test_backend_messages_classified_by_phrase() {
        for msg in [
            "TypeError: Failed to fetch",
            "NetworkError when attempting to fetch resource.",
            "Network request failed",
            "read: connection reset by peer",
            "AbortError: The user aborted a request.",
        ] {
            assert_eq!(StoreError::Backend(msg.into()).retry_class(), RetryClass::Transient, "{msg}");
        }
        assert_eq!(
            StoreError::Backend("permission denied for table users".into()).retry_class(),
            RetryClass::Permanent
        );
    }

    #[test]
    fn test_cancelled_and_permanent() {
        assert_eq!(StoreError::Cancelled.retry_class(), RetryClass::Cancelled);
        assert_eq!(StoreError::not_found("products", "p1").retry_class(), RetryClass::Permanent);
        assert_eq!(StoreError::Conflict("dup".into()).retry_class(), RetryClass::Permanent);
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            StoreError::not_found("cash_sessions", "s1").to_string(),
            "cash_sessions not found: s1"
        );
    }
}
