//! # In-Memory Backend
//!
//! `MemoryStore` keeps every resource as an insertion-ordered vector of rows.
//! It backs tests and demos, and can simulate a flaky or slow remote:
//!
//! ```text
//! store.fail_next(StoreError::Network("reset".into()));   // next call fails
//! store.set_latency(Duration::from_secs(20));             // every call sleeps
//! store.calls().select                                     // calls observed
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::query::{Filter, Insert, Query, Row};
use crate::remote::{ensure_id, RemoteStore};

/// Snapshot of how many calls each operation received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub select: u64,
    pub count: u64,
    pub insert: u64,
    pub update: u64,
    pub delete: u64,
}

#[derive(Default)]
struct Counters {
    select: AtomicU64,
    count: AtomicU64,
    insert: AtomicU64,
    update: AtomicU64,
    delete: AtomicU64,
}

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Row>>,
    /// (resource, key) → row id
    unique_keys: HashMap<(String, String), String>,
}

/// Process-local `RemoteStore`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failures: Mutex<VecDeque<StoreError>>,
    latency: Mutex<Duration>,
    counters: Counters,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error returned by the next operation, whichever it is.
    pub fn fail_next(&self, err: StoreError) {
        if let Ok(mut queue) = self.failures.lock() {
            queue.push_back(err);
        }
    }

    /// Delay applied before every operation.
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut l) = self.latency.lock() {
            *l = latency;
        }
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            select: self.counters.select.load(Ordering::SeqCst),
            count: self.counters.count.load(Ordering::SeqCst),
            insert: self.counters.insert.load(Ordering::SeqCst),
            update: self.counters.update.load(Ordering::SeqCst),
            delete: self.counters.delete.load(Ordering::SeqCst),
        }
    }

    /// All rows of a resource, in insertion order. For assertions.
    pub async fn dump(&self, resource: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .rows
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    async fn before_call(&self, counter: &AtomicU64) -> StoreResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency.lock().map(|l| *l).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let injected = self.failures.lock().ok().and_then(|mut q| q.pop_front());
        match injected {
            Some(err) => {
                debug!(error = %err, "Injected store failure");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, query: &Query) -> StoreResult<Vec<Row>> {
        self.before_call(&self.counters.select).await?;
        let tables = self.tables.read().await;
        let rows = tables
            .rows
            .get(&query.resource)
            .map(|rows| query.apply(rows.iter().cloned()))
            .unwrap_or_default();
        Ok(rows)
    }

    async fn count(&self, resource: &str, filters: &[Filter]) -> StoreResult<u64> {
        self.before_call(&self.counters.count).await?;
        let tables = self.tables.read().await;
        let n = tables
            .rows
            .get(resource)
            .map(|rows| {
                rows.iter()
                    .filter(|r| filters.iter().all(|f| f.matches(r)))
                    .count()
            })
            .unwrap_or(0);
        Ok(n as u64)
    }

    async fn insert(&self, insert: Insert) -> StoreResult<Row> {
        self.before_call(&self.counters.insert).await?;
        let Insert {
            resource,
            mut row,
            unique_key,
        } = insert;
        let id = ensure_id(&mut row);

        let mut tables = self.tables.write().await;
        let exists = tables
            .rows
            .get(&resource)
            .is_some_and(|rows| rows.iter().any(|r| r.get("id").and_then(|v| v.as_str()) == Some(id.as_str())));
        if exists {
            return Err(StoreError::Conflict(format!("{resource}.id {id} already exists")));
        }
        if let Some(key) = unique_key {
            let slot = (resource.clone(), key);
            if tables.unique_keys.contains_key(&slot) {
                return Err(StoreError::Conflict(format!(
                    "{resource} uniqueness key {} already exists",
                    slot.1
                )));
            }
            tables.unique_keys.insert(slot, id.clone());
        }

        tables.rows.entry(resource).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, resource: &str, id: &str, patch: Row) -> StoreResult<Row> {
        self.before_call(&self.counters.update).await?;
        let mut tables = self.tables.write().await;
        let row = tables
            .rows
            .get_mut(resource)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|r| r.get("id").and_then(|v| v.as_str()) == Some(id))
            })
            .ok_or_else(|| StoreError::not_found(resource, id))?;

        for (k, v) in patch {
            if k != "id" {
                row.insert(k, v);
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, resource: &str, id: &str) -> StoreResult<()> {
        self.before_call(&self.counters.delete).await?;
        let mut tables = self.tables.write().await;
        let removed = match tables.rows.get_mut(resource) {
            Some(rows) => {
                let before = rows.len();
                rows.retain(|r| r.get("id").and_then(|v| v.as_str()) != Some(id));
                before != rows.len()
            }
            None => false,
        };
        if !removed {
            return Err(StoreError::not_found(resource, id));
        }
        tables
            .unique_keys
            .retain(|(res, _), row_id| !(res == resource && row_id == id));
        Ok(())
    }
}

/// Seeds rows directly, bypassing counters and injected failures.
impl MemoryStore {
    pub async fn seed(&self, resource: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.write().await;
        let table = tables.rows.entry(resource.to_string()).or_default();
        for mut row in rows {
            ensure_id(&mut row);
            table.push(row);
        }
    }

    /// Resources currently holding at least one row.
    pub async fn resources(&self) -> HashSet<String> {
        self.tables
            .read()
            .await
            .rows
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}
