//! # Domain Types
//!
//! Records managed by the data layer. All of them serialize camelCase; the
//! store boundary maps top-level keys to snake_case columns.
//!
//! ## Entity Relationship
//! ```text
//! ┌──────────────────┐        ┌──────────────────┐
//! │ PermissionProfile│ 1    * │   UserProfile    │
//! │ isAdmin          │◄───────│ permissionProfile│
//! │ permissions{}    │        │ active           │
//! └──────────────────┘        └────────┬─────────┘
//!                                      │ 1
//!           ┌──────────────────────────┼──────────────────────────┐
//!           │ *                        │ *                        │ *
//! ┌─────────▼────────┐       ┌─────────▼────────┐       ┌─────────▼────────┐
//! │   CashSession    │       │      Sale        │       │  AuditLogEntry   │
//! │   (session.rs)   │       │ items[] ──► Product      │  append-only     │
//! └──────────────────┘       └──────────────────┘       └──────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::session::MovementKind;

// =============================================================================
// Product
// =============================================================================

/// A product in the inventory. Deactivated instead of deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub cost_cents: Option<i64>,
    pub stock: i64,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.active && self.stock >= quantity
    }
}

// =============================================================================
// Sale
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Debit,
    Credit,
    Pix,
    Transfer,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Debit => "debit card",
            PaymentMethod::Credit => "credit card",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Transfer => "bank transfer",
        }
    }
}

/// A line item, snapshotting name and price at the time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl SaleItem {
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub items: Vec<SaleItem>,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub installments: u32,
    /// Cash session that received the money, for cash sales.
    #[serde(default)]
    pub cash_session_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Purchase
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

impl PurchaseItem {
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_cost_cents).multiply_quantity(self.quantity)
    }
}

/// Stock received from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub user_id: String,
    pub supplier: String,
    pub items: Vec<PurchaseItem>,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Users & Permissions
// =============================================================================

/// Fine-grained grants carried by a permission profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum Permission {
    ManageUsers,
    ManageInventory,
    ViewReports,
    ReopenCashSession,
    ManageCash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PermissionProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
}

/// A user's profile row. Soft-deleted via `active = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub permission_profile_id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// Who is making a call. Built at sign-in from the user's profile and
/// permission profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: String,
    pub user_name: String,
    pub is_admin: bool,
    pub permissions: BTreeSet<Permission>,
}

impl Actor {
    pub fn new(user: &UserProfile, profile: Option<&PermissionProfile>) -> Self {
        Self {
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            is_admin: profile.is_some_and(|p| p.is_admin),
            permissions: profile.map(|p| p.permissions.clone()).unwrap_or_default(),
        }
    }

    /// Administrators hold every permission implicitly.
    pub fn has(&self, permission: Permission) -> bool {
        self.is_admin || self.permissions.contains(&permission)
    }

    pub fn can_reopen_cash(&self) -> bool {
        self.has(Permission::ReopenCashSession)
    }

    /// Owner of the record or an administrator.
    pub fn can_act_for(&self, user_id: &str) -> bool {
        self.is_admin || self.user_id == user_id
    }
}

// =============================================================================
// Audit Records
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Deactivate,
    Reactivate,
    Open,
    Close,
    Reopen,
    Withdrawal,
    Deposit,
    AutoClose,
    Sale,
    Purchase,
    SignIn,
    SignOut,
}

impl From<MovementKind> for AuditAction {
    fn from(kind: MovementKind) -> Self {
        match kind {
            MovementKind::Withdrawal => AuditAction::Withdrawal,
            MovementKind::Deposit => AuditAction::Deposit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntity {
    CashSession,
    Product,
    Sale,
    Purchase,
    User,
    PermissionProfile,
}

impl fmt::Display for AuditEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditEntity::CashSession => "cash_session",
            AuditEntity::Product => "product",
            AuditEntity::Sale => "sale",
            AuditEntity::Purchase => "purchase",
            AuditEntity::User => "user",
            AuditEntity::PermissionProfile => "permission_profile",
        };
        f.write_str(name)
    }
}

/// One row of the general audit trail. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_name: String,
    pub action: AuditAction,
    pub entity: AuditEntity,
    pub entity_id: String,
    pub details: String,
}

/// Structured details for governance-sensitive register actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashAuditMetadata {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_type: Option<MovementKind>,
}

/// One row of the cash-register audit trail. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashRegisterAuditRecord {
    pub id: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
    pub action: AuditAction,
    pub metadata: CashAuditMetadata,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserProfile {
        UserProfile {
            id: "u1".into(),
            name: "Ana".into(),
            email: "ana@shop.test".into(),
            permission_profile_id: Some("p1".into()),
            active: true,
            created_at: None,
        }
    }

    #[test]
    fn test_actor_from_profile() {
        let profile = PermissionProfile {
            id: "p1".into(),
            name: "Supervisor".into(),
            is_admin: false,
            permissions: [Permission::ReopenCashSession].into_iter().collect(),
        };
        let actor = Actor::new(&user(), Some(&profile));
        assert!(!actor.is_admin);
        assert!(actor.can_reopen_cash());
        assert!(!actor.has(Permission::ManageUsers));
        assert!(actor.can_act_for("u1"));
        assert!(!actor.can_act_for("u2"));
    }

    #[test]
    fn test_admin_has_everything() {
        let profile = PermissionProfile {
            id: "p0".into(),
            name: "Admin".into(),
            is_admin: true,
            permissions: BTreeSet::new(),
        };
        let actor = Actor::new(&user(), Some(&profile));
        assert!(actor.has(Permission::ManageUsers));
        assert!(actor.can_reopen_cash());
        assert!(actor.can_act_for("someone-else"));
    }

    #[test]
    fn test_actor_without_profile_has_nothing() {
        let actor = Actor::new(&user(), None);
        assert!(!actor.is_admin);
        assert!(actor.permissions.is_empty());
    }

    #[test]
    fn test_user_profile_defaults_active() {
        let json = serde_json::json!({"id": "u9", "name": "New", "email": "n@x.io"});
        let parsed: UserProfile = serde_json::from_value(json).unwrap();
        assert!(parsed.active);
        assert_eq!(parsed.permission_profile_id, None);
    }

    #[test]
    fn test_cash_audit_metadata_omits_empty_fields() {
        let meta = CashAuditMetadata {
            amount: Some(Money::from_cents(1500)),
            reason: None,
            movement_type: Some(MovementKind::Withdrawal),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({"amount": 1500, "movementType": "withdrawal"}));
    }

    #[test]
    fn test_sale_item_line_total() {
        let item = SaleItem {
            product_id: "p".into(),
            name: "Screen protector".into(),
            quantity: 3,
            unit_price_cents: 1999,
        };
        assert_eq!(item.line_total().cents(), 5997);
    }

    #[test]
    fn test_permission_wire_names() {
        let json = serde_json::to_string(&Permission::ReopenCashSession).unwrap();
        assert_eq!(json, "\"reopenCashSession\"");
        assert_eq!(serde_json::to_string(&AuditAction::AutoClose).unwrap(), "\"auto_close\"");
    }
}
