//! # Error Types
//!
//! Domain-specific error types for shopdesk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  shopdesk-core errors (this file)                                      │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Field-level input failures                     │
//! │                                                                         │
//! │  shopdesk-store errors                                                 │
//! │  └── StoreError       - Remote store / auth failures                   │
//! │                                                                         │
//! │  shopdesk-data errors                                                  │
//! │  ├── DataError        - Everything a service can return                │
//! │  └── ApiError         - What the UI sees (serialized)                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DataError → ApiError → UI         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::money::Money;
use crate::session::SessionStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The user already has a cash session for the current calendar day.
    ///
    /// ## When This Occurs
    /// - Opening the register twice on the same day
    /// - Opening again after the day's session was closed
    /// - Two instances racing to open (caught by the store uniqueness key)
    ///
    /// ## User Workflow
    /// ```text
    /// Open register (09:00) ──► session #12 open
    /// Close register (13:00) ──► session #12 closed
    /// Open register (14:00)
    ///      │
    ///      ▼
    /// DuplicateSessionToday { status: Closed, opened_at: 09:00 }
    ///      │
    ///      ▼
    /// UI asks an administrator to reopen #12 instead
    /// ```
    #[error("A cash session already exists for today ({status}, opened at {opened_at})")]
    DuplicateSessionToday {
        status: SessionStatus,
        opened_at: DateTime<Utc>,
    },

    #[error("Cash session not found: {0}")]
    SessionNotFound(String),

    /// Movements and closing require an open session.
    #[error("Cash session {0} is closed")]
    SessionClosed(String),

    /// Only a closed session can be reopened.
    #[error("Cash session {0} is not closed")]
    SessionNotClosed(String),

    /// The actor neither owns the session nor is an administrator.
    #[error("User {user_id} does not own cash session {session_id}")]
    NotSessionOwner { session_id: String, user_id: String },

    /// The actor lacks a grant required for the operation.
    #[error("Permission required: {action}")]
    MissingPermission { action: String },

    /// A withdrawal larger than the cash currently in the register.
    #[error("Insufficient cash in register: available {available}, requested {requested}")]
    InsufficientCash { available: Money, requested: Money },

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Selling more units than are in stock.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Soft-deleted users cannot sign in or be assigned sessions.
    #[error("User {0} is inactive")]
    UserInactive(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// True for errors caused by who is asking rather than what was asked.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            CoreError::NotSessionOwner { .. }
                | CoreError::MissingPermission { .. }
                | CoreError::UserInactive(_)
        )
    }

    /// True when the referenced record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::SessionNotFound(_) | CoreError::ProductNotFound(_) | CoreError::UserNotFound(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (malformed email, unparseable date, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (SKU, email).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
