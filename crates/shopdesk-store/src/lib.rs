//! # shopdesk-store: Remote Data Service Boundary
//!
//! The data layer never talks to a backend directly. It talks to
//! [`RemoteStore`] (row CRUD with filters) and [`AuthProvider`] (password
//! auth), and converts between snake_case rows and camelCase models with
//! [`casing`].
//!
//! ## Module Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        shopdesk-store                                   │
//! │                                                                         │
//! │  remote.rs   RemoteStore trait                                         │
//! │  auth.rs     AuthProvider trait + MemoryAuth                           │
//! │  query.rs    Query / Filter / Insert, shared filter semantics          │
//! │  casing.rs   snake_case ⇄ camelCase, encode / decode                   │
//! │  memory.rs   MemoryStore (fault injection, latency, call counts)       │
//! │  sqlite.rs   SqliteStore (sqlx, embedded migrations)                   │
//! │  error.rs    StoreError + RetryClass                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let store = SqliteStore::connect(SqliteConfig::new("./shopdesk.db")).await?;
//! let rows = store
//!     .select(&Query::new("products").filter(Filter::eq("active", true)))
//!     .await?;
//! let products: Vec<Product> = casing::decode_all(rows)?;
//! ```

pub mod auth;
pub mod casing;
pub mod error;
pub mod memory;
pub mod query;
pub mod remote;
pub mod sqlite;

pub use auth::{AuthProvider, AuthSession, AuthUser, MemoryAuth, UserAttributes};
pub use error::{RetryClass, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use query::{Direction, Filter, Insert, Query, Row};
pub use remote::RemoteStore;
pub use sqlite::{SqliteConfig, SqliteStore};

/// Resource names used by the data layer.
pub mod resources {
    pub const CASH_SESSIONS: &str = "cash_sessions";
    pub const PRODUCTS: &str = "products";
    pub const SALES: &str = "sales";
    pub const PURCHASES: &str = "purchases";
    pub const USERS: &str = "users";
    pub const PERMISSION_PROFILES: &str = "permissions_profiles";
    pub const AUDIT_LOGS: &str = "audit_logs";
    pub const CASH_REGISTER_AUDIT_LOGS: &str = "cash_register_audit_logs";
}
