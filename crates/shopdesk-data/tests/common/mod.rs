//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use shopdesk_core::{Actor, Permission};
use shopdesk_data::{
    DataConfig, DataLayer, DataResult, InvalidationBus, ManualClock, Notifier, NotifyEvent,
};
use shopdesk_store::{
    AuthProvider, Filter, Insert, MemoryAuth, MemoryStore, Query, RemoteStore, Row, StoreError,
    StoreResult,
};

/// Shop offset used by every test: UTC-03:00.
pub const UTC_OFFSET_MINUTES: i32 = -180;

pub fn tz() -> FixedOffset {
    FixedOffset::east_opt(UTC_OFFSET_MINUTES * 60).unwrap()
}

/// Local shop time as UTC.
pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    tz().with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn config() -> DataConfig {
    let mut config = DataConfig::default().with_utc_offset_minutes(UTC_OFFSET_MINUTES);
    config.remote.retry_delay_ms = 10;
    config
}

pub fn admin() -> Actor {
    Actor {
        user_id: "admin".into(),
        user_name: "Admin".into(),
        is_admin: true,
        permissions: BTreeSet::new(),
    }
}

pub fn cashier(id: &str) -> Actor {
    Actor {
        user_id: id.into(),
        user_name: format!("Cashier {id}"),
        is_admin: false,
        permissions: [Permission::ManageCash].into_iter().collect(),
    }
}

pub fn with_permissions(id: &str, permissions: &[Permission]) -> Actor {
    Actor {
        user_id: id.into(),
        user_name: id.into(),
        is_admin: false,
        permissions: permissions.iter().copied().collect(),
    }
}

/// Captures notifications instead of sending them.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotifyEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotifyEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &NotifyEvent) -> DataResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Delegates to a `MemoryStore` but refuses updates to chosen resources,
/// leaving a multi-write operation half done.
pub struct RejectingStore {
    inner: Arc<MemoryStore>,
    rejected: Mutex<HashSet<String>>,
}

impl RejectingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            rejected: Mutex::new(HashSet::new()),
        }
    }

    pub fn reject_updates(&self, resource: &str) {
        self.rejected.lock().unwrap().insert(resource.to_string());
    }
}

#[async_trait]
impl RemoteStore for RejectingStore {
    async fn select(&self, query: &Query) -> StoreResult<Vec<Row>> {
        self.inner.select(query).await
    }

    async fn count(&self, resource: &str, filters: &[Filter]) -> StoreResult<u64> {
        self.inner.count(resource, filters).await
    }

    async fn insert(&self, insert: Insert) -> StoreResult<Row> {
        self.inner.insert(insert).await
    }

    async fn update(&self, resource: &str, id: &str, patch: Row) -> StoreResult<Row> {
        if self.rejected.lock().unwrap().contains(resource) {
            return Err(StoreError::Backend(format!(
                "permission denied for table {resource}"
            )));
        }
        self.inner.update(resource, id, patch).await
    }

    async fn delete(&self, resource: &str, id: &str) -> StoreResult<()> {
        self.inner.delete(resource, id).await
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub auth: Arc<MemoryAuth>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub layer: DataLayer,
}

pub struct HarnessBuilder {
    config: DataConfig,
    store: Arc<MemoryStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    bus: Option<Arc<dyn InvalidationBus>>,
    now: DateTime<Utc>,
    profile_trigger: Option<Duration>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: config(),
            store: Arc::new(MemoryStore::new()),
            remote: None,
            bus: None,
            now: local(2024, 3, 9, 10, 0),
            profile_trigger: None,
        }
    }

    pub fn config(mut self, config: DataConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = store;
        self
    }

    /// Store handed to the data layer when it should not be the raw
    /// `MemoryStore`. `Harness::store` still points at the memory store.
    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn bus(mut self, bus: Arc<dyn InvalidationBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn profile_trigger(mut self, delay: Duration) -> Self {
        self.profile_trigger = Some(delay);
        self
    }

    pub fn build(self) -> Harness {
        let mut auth = MemoryAuth::new();
        if let Some(delay) = self.profile_trigger {
            auth = auth.with_profile_trigger(self.store.clone(), delay);
        }
        let auth = Arc::new(auth);
        let clock = Arc::new(ManualClock::new(self.now));
        let notifier = Arc::new(RecordingNotifier::default());

        let remote = self
            .remote
            .unwrap_or_else(|| self.store.clone() as Arc<dyn RemoteStore>);
        let mut builder = DataLayer::builder(self.config)
            .store(remote)
            .auth(auth.clone() as Arc<dyn AuthProvider>)
            .clock(clock.clone())
            .notifier(notifier.clone());
        if let Some(bus) = self.bus {
            builder = builder.bus(bus);
        }

        Harness {
            store: self.store,
            auth,
            clock,
            notifier,
            layer: builder.build().unwrap(),
        }
    }
}

pub fn harness() -> Harness {
    HarnessBuilder::new().build()
}
