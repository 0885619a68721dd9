//! # Timeout & Retry
//!
//! ```text
//! fetch_with_retry
//! ┌──────────────────────────────────────────────────────────────┐
//! │ attempt 0 ──► with_timeout(op) ──► Ok ─────────────► return  │
//! │                     │                                        │
//! │                     └─► Err ─┬─ Cancelled ─────────► return  │
//! │                              ├─ Permanent ─────────► return  │
//! │                              └─ Transient                    │
//! │                                   │ retries left?            │
//! │                                   ├─ no ────────────► return │
//! │                                   └─ sleep(d), d *= 2, again │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A timed-out call is not cancelled. It keeps running as a detached task
//! and its result is dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shopdesk_store::{casing, Filter, Insert, Query, RemoteStore, RetryClass, Row};
use tracing::{debug, warn};

use crate::error::{DataError, DataResult};

/// Retry schedule for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, initial_delay: Duration) -> Self {
        RetryPolicy {
            retries,
            initial_delay,
        }
    }

    /// Never retries.
    pub fn none() -> Self {
        RetryPolicy {
            retries: 0,
            initial_delay: Duration::ZERO,
        }
    }

    /// Pure doubling from `initial_delay`, no jitter, no elapsed-time cap.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_delay,
            initial_interval: self.initial_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: Duration::from_secs(24 * 60 * 60),
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Races `fut` against a timer. On expiry fails with `DataError::Timeout`
/// carrying `message`; the operation itself keeps running.
pub async fn with_timeout<T, Fut>(fut: Fut, timeout: Duration, message: &str) -> DataResult<T>
where
    T: Send + 'static,
    Fut: Future<Output = DataResult<T>> + Send + 'static,
{
    let handle = tokio::spawn(fut);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(DataError::TaskFailed(join_err.to_string())),
        Err(_) => {
            warn!(?timeout, message, "Operation timed out");
            Err(DataError::Timeout(message.to_string()))
        }
    }
}

/// Runs `fetcher`, retrying transient failures with exponential backoff.
pub async fn fetch_with_retry<T, F, Fut>(policy: &RetryPolicy, mut fetcher: F) -> DataResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DataResult<T>>,
{
    let mut backoff = policy.create_backoff();
    let mut attempt: u32 = 0;

    loop {
        match fetcher().await {
            Ok(value) => return Ok(value),
            Err(e) => match e.retry_class() {
                RetryClass::Cancelled => {
                    debug!("Request cancelled, not retrying");
                    return Err(e);
                }
                RetryClass::Permanent => return Err(e),
                RetryClass::Transient if attempt >= policy.retries => {
                    warn!(attempts = attempt + 1, error = %e, "Giving up after transient failures");
                    return Err(e);
                }
                RetryClass::Transient => {
                    let delay = backoff.next_backoff().unwrap_or(policy.initial_delay);
                    attempt += 1;
                    warn!(
                        attempt,
                        max = policy.retries,
                        ?delay,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            },
        }
    }
}

// =============================================================================
// Remote
// =============================================================================

/// A [`RemoteStore`] where every call goes through retry and a per-call
/// timeout.
#[derive(Clone)]
pub struct Remote {
    store: Arc<dyn RemoteStore>,
    policy: RetryPolicy,
    call_timeout: Duration,
}

impl Remote {
    pub fn new(store: Arc<dyn RemoteStore>, policy: RetryPolicy, call_timeout: Duration) -> Self {
        Remote {
            store,
            policy,
            call_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn call<T, F, Fut>(&self, message: String, mut op: F) -> DataResult<T>
    where
        T: Send + 'static,
        F: FnMut(Arc<dyn RemoteStore>) -> Fut,
        Fut: Future<Output = DataResult<T>> + Send + 'static,
    {
        let timeout = self.call_timeout;
        fetch_with_retry(&self.policy, || {
            with_timeout(op(self.store.clone()), timeout, &message)
        })
        .await
    }

    pub async fn select(&self, query: &Query) -> DataResult<Vec<Row>> {
        let message = format!("Timed out loading {}", query.resource);
        self.call(message, |store| {
            let query = query.clone();
            async move { store.select(&query).await.map_err(DataError::from) }
        })
        .await
    }

    pub async fn select_as<T: DeserializeOwned>(&self, query: &Query) -> DataResult<Vec<T>> {
        let rows = self.select(query).await?;
        Ok(casing::decode_all(rows)?)
    }

    /// Single row by id, decoded.
    pub async fn get_as<T: DeserializeOwned>(&self, resource: &str, id: &str) -> DataResult<Option<T>> {
        let query = Query::new(resource).filter(Filter::eq("id", id)).limit(1);
        let mut rows = self.select(&query).await?;
        match rows.pop() {
            Some(row) => Ok(Some(casing::decode(row)?)),
            None => Ok(None),
        }
    }

    pub async fn count(&self, resource: &str, filters: &[Filter]) -> DataResult<u64> {
        let message = format!("Timed out counting {resource}");
        self.call(message, |store| {
            let resource = resource.to_string();
            let filters = filters.to_vec();
            async move { store.count(&resource, &filters).await.map_err(DataError::from) }
        })
        .await
    }

    pub async fn insert(&self, insert: Insert) -> DataResult<Row> {
        let message = format!("Timed out saving {}", insert.resource);
        self.call(message, |store| {
            let insert = insert.clone();
            async move { store.insert(insert).await.map_err(DataError::from) }
        })
        .await
    }

    /// Encodes `model`, inserts it and decodes the stored row.
    pub async fn insert_model<T>(&self, resource: &str, model: &T, unique_key: Option<String>) -> DataResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut insert = Insert::new(resource, casing::encode(model)?);
        if let Some(key) = unique_key {
            insert = insert.unique_key(key);
        }
        let row = self.insert(insert).await?;
        Ok(casing::decode(row)?)
    }

    pub async fn update(&self, resource: &str, id: &str, patch: Row) -> DataResult<Row> {
        let message = format!("Timed out updating {resource}");
        self.call(message, |store| {
            let resource = resource.to_string();
            let id = id.to_string();
            let patch = patch.clone();
            async move { store.update(&resource, &id, patch).await.map_err(DataError::from) }
        })
        .await
    }

    /// Merges the camelCase fields of `patch` into the row and decodes it.
    pub async fn update_as<T, P>(&self, resource: &str, id: &str, patch: &P) -> DataResult<T>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let row = self.update(resource, id, casing::encode(patch)?).await?;
        Ok(casing::decode(row)?)
    }

    pub async fn delete(&self, resource: &str, id: &str) -> DataResult<()> {
        let message = format!("Timed out deleting from {resource}");
        self.call(message, |store| {
            let resource = resource.to_string();
            let id = id.to_string();
            async move { store.delete(&resource, &id).await.map_err(DataError::from) }
        })
        .await
    }
}
