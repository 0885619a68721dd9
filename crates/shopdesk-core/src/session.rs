//! # Cash Sessions
//!
//! A cash session is one user's register for one calendar day.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   open_register ──► ┌────────┐  close   ┌────────┐                      │
//! │                     │  open  │ ───────► │ closed │                      │
//! │     movements ────► │        │ ◄─────── │        │                      │
//! │   (withdrawal /     └───┬────┘  reopen  └────────┘                      │
//! │    deposit)             │      (admin or grant + reason)                │
//! │                         │                                               │
//! │                         └── still open after its day and never          │
//! │                             reopened: closed at 23:59:59.999 of the     │
//! │                             opening day by `reconcile`                  │
//! │                                                                         │
//! │   Invariant: cash_in_register == opening_balance + deposits - withdrawals
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions are never deleted. Movements are immutable once appended.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::dates::{end_of_day, local_date};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_amount_bound, validate_positive_amount, validate_reason};

// =============================================================================
// Status & Movement Kind
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Withdrawal,
    Deposit,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Withdrawal => "withdrawal",
            MovementKind::Deposit => "deposit",
        }
    }
}

// =============================================================================
// Cash Movement
// =============================================================================

/// Money taken out of or put into the register outside of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashMovement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MovementKind,
    pub amount: Money,
    pub reason: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    /// Set when the movement is the cash leg of a sale.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<String>,
}

impl CashMovement {
    /// Builds a validated movement. Amount must be positive and the reason
    /// non-empty.
    pub fn new(
        kind: MovementKind,
        amount: Money,
        reason: &str,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Self> {
        validate_positive_amount("amount", amount)?;
        validate_reason(reason)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            amount,
            reason: reason.trim().to_string(),
            timestamp,
            sale_id: None,
        })
    }

    pub fn for_sale(mut self, sale_id: impl Into<String>) -> Self {
        self.sale_id = Some(sale_id.into());
        self
    }

    /// Effect on the cash in register.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            MovementKind::Withdrawal => -self.amount,
            MovementKind::Deposit => self.amount,
        }
    }
}

// =============================================================================
// Cash Session
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashSession {
    pub id: String,
    pub user_id: String,
    /// Human-facing sequence number (count of all sessions + 1 at open time).
    pub display_id: i64,
    pub opening_balance: Money,
    pub cash_in_register: Money,
    pub withdrawals: Money,
    pub deposits: Money,
    #[serde(default)]
    pub movements: Vec<CashMovement>,
    #[ts(as = "String")]
    pub open_time: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub reopened_by: Option<String>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub reopened_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reopen_reason: Option<String>,
}

impl CashSession {
    /// A freshly opened session: register holds exactly the opening balance.
    pub fn open(
        user_id: impl Into<String>,
        display_id: i64,
        opening_balance: Money,
        open_time: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if opening_balance.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "openingBalance".to_string(),
            }
            .into());
        }
        validate_amount_bound("openingBalance", opening_balance)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            display_id,
            opening_balance,
            cash_in_register: opening_balance,
            withdrawals: Money::zero(),
            deposits: Money::zero(),
            movements: Vec::new(),
            open_time,
            close_time: None,
            status: SessionStatus::Open,
            reopened_by: None,
            reopened_at: None,
            reopen_reason: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// True once the session has been reopened by someone; such sessions are
    /// exempt from the day-rollover closure.
    pub fn has_reopen_metadata(&self) -> bool {
        self.reopened_by.is_some() || self.reopened_at.is_some() || self.reopen_reason.is_some()
    }

    /// Calendar day the session belongs to.
    pub fn opening_day(&self, tz: &FixedOffset) -> NaiveDate {
        local_date(self.open_time, tz)
    }

    /// `cash_in_register == opening_balance + deposits - withdrawals`.
    pub fn is_balanced(&self) -> bool {
        self.cash_in_register == self.opening_balance + self.deposits - self.withdrawals
    }

    /// Appends a movement and adjusts the totals.
    ///
    /// ## Errors
    /// - `SessionClosed` if the session is not open
    /// - `InsufficientCash` for a withdrawal above the cash in register
    pub fn apply_movement(&mut self, movement: CashMovement) -> CoreResult<()> {
        if !self.is_open() {
            return Err(CoreError::SessionClosed(self.id.clone()));
        }
        let (withdrawals, deposits) = match movement.kind {
            MovementKind::Withdrawal => {
                if movement.amount > self.cash_in_register {
                    return Err(CoreError::InsufficientCash {
                        available: self.cash_in_register,
                        requested: movement.amount,
                    });
                }
                (self.withdrawals.checked_add(movement.amount), Some(self.deposits))
            }
            MovementKind::Deposit => (Some(self.withdrawals), self.deposits.checked_add(movement.amount)),
        };
        let cash_in_register = self.cash_in_register.checked_add(movement.signed_amount());
        let (Some(withdrawals), Some(deposits), Some(cash_in_register)) =
            (withdrawals, deposits, cash_in_register)
        else {
            return Err(ValidationError::OutOfRange {
                field: "cashInRegister".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        };
        self.withdrawals = withdrawals;
        self.deposits = deposits;
        self.cash_in_register = cash_in_register;
        self.movements.push(movement);
        Ok(())
    }

    pub fn close(&mut self, at: DateTime<Utc>) -> CoreResult<()> {
        if !self.is_open() {
            return Err(CoreError::SessionClosed(self.id.clone()));
        }
        self.status = SessionStatus::Closed;
        self.close_time = Some(at);
        Ok(())
    }

    /// Reopens a closed session and stamps who did it and why.
    ///
    /// Authorization is the caller's job; this only enforces the state
    /// transition and the reason.
    pub fn reopen(&mut self, by_user: &str, reason: &str, at: DateTime<Utc>) -> CoreResult<()> {
        validate_reason(reason)?;
        if self.is_open() {
            return Err(CoreError::SessionNotClosed(self.id.clone()));
        }
        self.status = SessionStatus::Open;
        self.close_time = None;
        self.reopened_by = Some(by_user.to_string());
        self.reopened_at = Some(at);
        self.reopen_reason = Some(reason.trim().to_string());
        Ok(())
    }

    /// Whether the day rollover should close this session.
    pub fn needs_auto_close(&self, today: NaiveDate, tz: &FixedOffset) -> bool {
        self.is_open() && !self.has_reopen_metadata() && self.opening_day(tz) < today
    }
}

// =============================================================================
// Day-Rollover Reconciliation
// =============================================================================

/// A session the rollover closed, with the close time it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoClosure {
    pub session_id: String,
    pub close_time: DateTime<Utc>,
}

/// Sessions as they should be presented, plus the corrections to persist.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub sessions: Vec<CashSession>,
    pub auto_closed: Vec<AutoClosure>,
}

/// Closes every session still open past its opening day.
///
/// ```text
///  today = 2024-03-12
///
///  #7  opened 03-10, open, never reopened  ──► closed at 03-10 23:59:59.999
///  #8  opened 03-11, open, reopened        ──► untouched
///  #9  opened 03-12, open                  ──► untouched
/// ```
///
/// Ordering of `sessions` is preserved.
pub fn reconcile(sessions: Vec<CashSession>, today: NaiveDate, tz: &FixedOffset) -> Reconciliation {
    let mut auto_closed = Vec::new();
    let sessions = sessions
        .into_iter()
        .map(|mut session| {
            if session.needs_auto_close(today, tz) {
                let close_time = end_of_day(session.opening_day(tz), tz);
                session.status = SessionStatus::Closed;
                session.close_time = Some(close_time);
                auto_closed.push(AutoClosure {
                    session_id: session.id.clone(),
                    close_time,
                });
            }
            session
        })
        .collect();

    Reconciliation {
        sessions,
        auto_closed,
    }
}

/// Uniqueness key for "one session per user per day".
pub fn daily_session_key(user_id: &str, day: NaiveDate) -> String {
    format!("{}:{}", user_id, day.format("%Y-%m-%d"))
}

// =============================================================================
// Unit Tests
// =============================================================================
