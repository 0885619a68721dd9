//! # Data Layer Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DataError Categories                               │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Business rules │  │  Remote store   │  │  Data layer             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core(CoreError)│  │  Store(...)     │  │  Timeout                │ │
//! │  │  └ Validation   │  │  └ retry_class  │  │  ProvisioningTimedOut   │ │
//! │  │                 │  │                 │  │  Forbidden, NotFound    │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │  Configuration  │  │  Side channels  │                              │
//! │  │                 │  │                 │                              │
//! │  │  InvalidConfig  │  │  Notification   │                              │
//! │  │  ConfigIo       │  │  TaskFailed     │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use shopdesk_core::{CoreError, ValidationError};
use shopdesk_store::{RetryClass, StoreError};
use thiserror::Error;

/// Result type alias for data layer operations.
pub type DataResult<T> = Result<T, DataError>;

#[derive(Debug, Error)]
pub enum DataError {
    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    // =========================================================================
    // Resilience
    // =========================================================================
    /// A remote call did not settle in time. The call itself keeps running.
    #[error("{0}")]
    Timeout(String),

    /// The profile row for a new account never appeared.
    ///
    /// ## When This Occurs
    /// - The backend trigger that creates `users` rows is slow or broken
    /// - Polling gave up after the configured number of attempts
    #[error("Profile for {email} was not created after {attempts} attempts")]
    ProvisioningTimedOut { email: String, attempts: u32 },

    // =========================================================================
    // Authorization & Lookup
    // =========================================================================
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration file error: {0}")]
    ConfigIo(String),

    // =========================================================================
    // Side Channels
    // =========================================================================
    #[error("Notification failed: {0}")]
    Notification(String),

    /// A spawned operation panicked or was aborted.
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl DataError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        DataError::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Only store errors can be transient; everything raised by the data
    /// layer itself is final.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            DataError::Store(e) => e.retry_class(),
            _ => RetryClass::Permanent,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DataError::Store(e) if e.is_conflict())
    }
}

impl From<ValidationError> for DataError {
    fn from(err: ValidationError) -> Self {
        DataError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::ConfigIo(err.to_string())
    }
}

impl From<toml::de::Error> for DataError {
    fn from(err: toml::de::Error) -> Self {
        DataError::ConfigIo(err.to_string())
    }
}

impl From<toml::ser::Error> for DataError {
    fn from(err: toml::ser::Error) -> Self {
        DataError::ConfigIo(err.to_string())
    }
}

impl From<url::ParseError> for DataError {
    fn from(err: url::ParseError) -> Self {
        DataError::InvalidConfig(format!("invalid URL: {err}"))
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        DataError::Notification(err.to_string())
    }
}
