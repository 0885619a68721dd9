//! # SQLite Backend
//!
//! `SqliteStore` keeps rows as JSON documents in one `records` table and
//! business uniqueness keys in `unique_keys`.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SqliteConfig::new(path) ──► SqliteStore::connect(config).await         │
//! │                                   │                                     │
//! │                                   ├── pool (WAL for file databases)     │
//! │                                   └── embedded migrations               │
//! │                                                                         │
//! │  records                           unique_keys                          │
//! │  ┌──────────┬────┬──────────┐      ┌──────────────┬─────────────┐      │
//! │  │ resource │ id │ data     │      │ resource,key │ row_id      │      │
//! │  ├──────────┼────┼──────────┤      ├──────────────┼─────────────┤      │
//! │  │ products │ p1 │ {"sku":…}│      │ cash_sessions│ s1          │      │
//! │  └──────────┴────┴──────────┘      │ u1:2024-03-10│             │      │
//! │                                    └──────────────┴─────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Filtering and ordering happen in Rust with the same [`Query::apply`] the
//! memory backend uses, so both backends agree on timestamp comparisons.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row as _, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::query::{Filter, Insert, Query, Row};
use crate::remote::{ensure_id, RemoteStore};

/// Embedded migrations from `crates/shopdesk-store/migrations`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// =============================================================================
// Configuration
// =============================================================================

/// SQLite connection settings.
///
/// ## Example
/// ```rust,ignore
/// let config = SqliteConfig::new("./shopdesk.db").max_connections(4);
/// let store = SqliteStore::connect(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file; `None` for an in-memory database.
    pub database_path: Option<PathBuf>,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub run_migrations: bool,
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteConfig {
            database_path: Some(path.into()),
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }

    /// Private database living as long as the pool. Single connection, since
    /// every SQLite in-memory connection is its own database.
    pub fn in_memory() -> Self {
        SqliteConfig {
            database_path: None,
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: SqliteConfig) -> StoreResult<Self> {
        let (options, pool_options) = match &config.database_path {
            Some(path) => {
                info!(path = %path.display(), "Opening SQLite store");
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
                    .create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(config.connect_timeout);
                (options, pool)
            }
            None => {
                info!("Opening in-memory SQLite store");
                let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
                // The database vanishes with its last connection.
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .acquire_timeout(config.connect_timeout);
                (options, pool)
            }
        };

        let pool = pool_options.connect_with(options).await?;
        let store = SqliteStore { pool };

        if config.run_migrations {
            store.run_migrations().await?;
        }
        Ok(store)
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        debug!("Running store migrations");
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn close(&self) {
        info!("Closing SQLite store");
        self.pool.close().await;
    }

    async fn load(&self, resource: &str) -> StoreResult<Vec<Row>> {
        let rows = sqlx::query("SELECT data FROM records WHERE resource = ? ORDER BY seq")
            .bind(resource)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| {
                let data: String = r.try_get("data")?;
                parse_row(&data)
            })
            .collect()
    }
}

fn parse_row(data: &str) -> StoreResult<Row> {
    match serde_json::from_str::<Value>(data)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Serialization("stored record is not an object".to_string())),
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn select(&self, query: &Query) -> StoreResult<Vec<Row>> {
        Ok(query.apply(self.load(&query.resource).await?))
    }

    async fn count(&self, resource: &str, filters: &[Filter]) -> StoreResult<u64> {
        if filters.is_empty() {
            let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE resource = ?")
                .bind(resource)
                .fetch_one(&self.pool)
                .await?;
            return Ok(n.max(0) as u64);
        }
        let rows = self.load(resource).await?;
        Ok(rows
            .iter()
            .filter(|r| filters.iter().all(|f| f.matches(r)))
            .count() as u64)
    }

    async fn insert(&self, insert: Insert) -> StoreResult<Row> {
        let Insert {
            resource,
            mut row,
            unique_key,
        } = insert;
        let id = ensure_id(&mut row);
        let data = serde_json::to_string(&row)?;

        let mut tx = self.pool.begin().await?;
        if let Some(key) = &unique_key {
            sqlx::query("INSERT INTO unique_keys (resource, key, row_id) VALUES (?, ?, ?)")
                .bind(&resource)
                .bind(key)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("INSERT INTO records (resource, id, data) VALUES (?, ?, ?)")
            .bind(&resource)
            .bind(&id)
            .bind(&data)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(resource = %resource, id = %id, "Inserted record");
        Ok(row)
    }

    async fn update(&self, resource: &str, id: &str, patch: Row) -> StoreResult<Row> {
        let mut tx = self.pool.begin().await?;
        let current: Option<String> =
            sqlx::query_scalar("SELECT data FROM records WHERE resource = ? AND id = ?")
                .bind(resource)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let mut row = parse_row(&current.ok_or_else(|| StoreError::not_found(resource, id))?)?;

        for (k, v) in patch {
            if k != "id" {
                row.insert(k, v);
            }
        }

        sqlx::query("UPDATE records SET data = ? WHERE resource = ? AND id = ?")
            .bind(serde_json::to_string(&row)?)
            .bind(resource)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn delete(&self, resource: &str, id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM records WHERE resource = ? AND id = ?")
            .bind(resource)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(resource, id));
        }
        sqlx::query("DELETE FROM unique_keys WHERE resource = ? AND row_id = ?")
            .bind(resource)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
