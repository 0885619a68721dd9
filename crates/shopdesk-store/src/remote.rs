//! # RemoteStore Trait
//!
//! The row-oriented CRUD surface the data layer talks to.
//!
//! ```text
//! ┌───────────────────┐        ┌──────────────────────────────────────┐
//! │  shopdesk-data    │        │        impl RemoteStore              │
//! │  services         │ ─────► │  MemoryStore   (tests, demos)        │
//! │  (Arc<dyn …>)     │        │  SqliteStore   (single process)      │
//! └───────────────────┘        │  <hosted backend client>             │
//!                              └──────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::query::{Filter, Insert, Query, Row};

/// Row CRUD against named resources.
///
/// Rows carry an `"id"` string; backends generate one on insert when it is
/// missing. Column names are snake_case.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Rows of `query.resource` matching every filter, sorted and limited.
    async fn select(&self, query: &Query) -> StoreResult<Vec<Row>>;

    /// Number of rows of `resource` matching every filter.
    async fn count(&self, resource: &str, filters: &[Filter]) -> StoreResult<u64>;

    /// Inserts a row and returns it as stored.
    ///
    /// ## Errors
    /// `Conflict` when the id or the uniqueness key already exists.
    async fn insert(&self, insert: Insert) -> StoreResult<Row>;

    /// Merges `patch` into the row's top-level keys and returns the result.
    ///
    /// ## Errors
    /// `NotFound` when no row has this id.
    async fn update(&self, resource: &str, id: &str, patch: Row) -> StoreResult<Row>;

    /// Removes a row and releases its uniqueness key.
    async fn delete(&self, resource: &str, id: &str) -> StoreResult<()>;
}

/// Ensures the row has a string id, generating a UUID when absent.
pub(crate) fn ensure_id(row: &mut Row) -> String {
    if let Some(id) = row.get("id").and_then(|v| v.as_str()) {
        return id.to_string();
    }
    let id = uuid::Uuid::new_v4().to_string();
    row.insert("id".to_string(), serde_json::Value::String(id.clone()));
    id
}
