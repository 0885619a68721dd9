//! # shopdesk-core: Pure Business Rules for ShopDesk
//!
//! Everything in this crate is deterministic: money arithmetic, cash-session
//! bookkeeping, audit records, date handling and validation. Time is always
//! passed in by the caller; nothing here reads a clock or touches the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ShopDesk Data Layer                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 shopdesk-data (services + cache)                │   │
//! │  │   CashSessionService, ProductService, CacheService, TaskQueue   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ shopdesk-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  session  │  │   money   │  │   dates   │  │ validation│  │   │
//! │  │   │ reconcile │  │ Currency  │  │ day bounds│  │   rules   │  │   │
//! │  │   │ movements │  │ Installm. │  │ normalize │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CLOCK • NO NETWORK • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              shopdesk-store (remote row store)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Sale, User, audit entries, ...)
//! - [`session`] - Cash sessions, movements and day-rollover reconciliation
//! - [`money`] - Integer money, currency formatting, installment plans
//! - [`dates`] - Calendar-day bounds and date normalization
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{FixedOffset, NaiveDate};
//! use shopdesk_core::dates::end_of_day;
//!
//! let tz = FixedOffset::west_opt(3 * 3600).unwrap();
//! let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
//! let closed_at = end_of_day(day, &tz);
//! assert_eq!(closed_at.to_rfc3339(), "2024-03-11T02:59:59.999+00:00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod dates;
pub mod error;
pub mod money;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{CurrencyFormat, InstallmentPlan, Money};
pub use session::{
    daily_session_key, reconcile, AutoClosure, CashMovement, CashSession, MovementKind,
    Reconciliation, SessionStatus,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest installment count accepted for a credit sale.
pub const MAX_INSTALLMENTS: u32 = 24;

/// Maximum quantity of a single item in a sale or purchase.
///
/// ## Business Reason
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Largest single amount (opening balance, movement) accepted, in cents.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;
