//! # API Error Type
//!
//! What a UI receives when a data-layer call fails.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DataError                                                              │
//! │     │                                                                   │
//! │     ├── Core(Validation)        ──► VALIDATION_ERROR   specific message │
//! │     ├── Core(Not owner / perm)  ──► FORBIDDEN          specific message │
//! │     ├── Core(duplicate, closed) ──► BUSINESS_LOGIC     specific message │
//! │     ├── Timeout                 ──► TIMEOUT            specific message │
//! │     ├── NotFound                ──► NOT_FOUND          specific message │
//! │     ├── Store(Network/Aborted)  ──► NETWORK_ERROR      generic message  │
//! │     └── Store(Backend/Database) ──► BACKEND_ERROR      generic, logged  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use shopdesk_core::CoreError;
use shopdesk_store::StoreError;

use crate::error::DataError;

/// Serialized as:
/// ```json
/// { "code": "BUSINESS_LOGIC", "message": "A cash session already exists today (closed, opened at ...)" }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Caller lacks ownership or permission (403)
    Forbidden,

    /// Sign-in rejected (401)
    Unauthenticated,

    /// Business rule violated (422)
    BusinessLogic,

    /// Insufficient stock
    InsufficientStock,

    /// Remote call did not answer in time
    Timeout,

    /// Connection dropped after retries
    NetworkError,

    /// Remote store failed
    BackendError,

    /// Internal error (500)
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(_) => ApiError::validation(message),
            CoreError::NotSessionOwner { .. } | CoreError::MissingPermission { .. } => {
                ApiError::new(ErrorCode::Forbidden, message)
            }
            CoreError::SessionNotFound(_)
            | CoreError::ProductNotFound(_)
            | CoreError::UserNotFound(_) => ApiError::new(ErrorCode::NotFound, message),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, message)
            }
            CoreError::UserInactive(_) => ApiError::new(ErrorCode::Unauthenticated, message),
            CoreError::DuplicateSessionToday { .. }
            | CoreError::SessionClosed(_)
            | CoreError::SessionNotClosed(_)
            | CoreError::InsufficientCash { .. } => ApiError::new(ErrorCode::BusinessLogic, message),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource, id } => ApiError::not_found(&resource, &id),
            StoreError::Conflict(msg) => {
                tracing::warn!("Unmapped conflict: {}", msg);
                ApiError::new(ErrorCode::BusinessLogic, "The record already exists")
            }
            StoreError::Auth(msg) => ApiError::new(ErrorCode::Unauthenticated, msg),
            StoreError::Network(_) | StoreError::Aborted(_) | StoreError::Cancelled => {
                ApiError::new(
                    ErrorCode::NetworkError,
                    "Connection problem, please check your network and try again",
                )
            }
            StoreError::Backend(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Remote store error: {}", e);
                ApiError::new(ErrorCode::BackendError, "Remote operation failed")
            }
            StoreError::Database(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::new(ErrorCode::BackendError, "Database operation failed")
            }
            StoreError::Serialization(e) => {
                tracing::error!("Malformed row: {}", e);
                ApiError::internal("Received malformed data")
            }
        }
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Core(e) => e.into(),
            DataError::Store(e) => e.into(),
            DataError::Timeout(msg) => ApiError::new(ErrorCode::Timeout, msg),
            e @ DataError::ProvisioningTimedOut { .. } => {
                ApiError::new(ErrorCode::Timeout, e.to_string())
            }
            e @ DataError::Forbidden(_) => ApiError::new(ErrorCode::Forbidden, e.to_string()),
            DataError::NotFound { resource, id } => ApiError::not_found(&resource, &id),
            DataError::InvalidConfig(e) | DataError::ConfigIo(e) => {
                tracing::error!("Configuration error: {}", e);
                ApiError::internal("Configuration error")
            }
            DataError::Notification(e) | DataError::TaskFailed(e) => {
                tracing::error!("Internal error: {}", e);
                ApiError::internal("Internal error")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
