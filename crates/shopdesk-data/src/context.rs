//! # Data Layer Facade
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DataLayer::builder(config)                                            │
//! │      .store(Arc<dyn RemoteStore>)      required                        │
//! │      .auth(Arc<dyn AuthProvider>)      default: MemoryAuth             │
//! │      .bus(Arc<dyn InvalidationBus>)    default: NoopBus                │
//! │      .clock(Arc<dyn Clock>)            default: SystemClock            │
//! │      .notifier(Arc<dyn Notifier>)      default: from [notifications]   │
//! │      .build()                                                          │
//! │                                                                         │
//! │  DataLayer                                                             │
//! │   ├── cash_sessions()   ├── products()   ├── sales()                   │
//! │   ├── purchases()       ├── users()      ├── permission_profiles()     │
//! │   └── auth()                                                           │
//! │                                                                         │
//! │  All services share one Arc<DataContext>.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use shopdesk_core::dates::local_date;
use shopdesk_store::{AuthProvider, MemoryAuth, RemoteStore, SqliteConfig, SqliteStore};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::audit::AuditLogger;
use crate::cache::CacheService;
use crate::clock::{Clock, SystemClock};
use crate::config::DataConfig;
use crate::error::{DataError, DataResult};
use crate::invalidation::{DataChanged, InvalidationBus, NoopBus};
use crate::notify::{NoopNotifier, Notifier, NotifyEvent, WebhookNotifier};
use crate::resilience::{with_timeout, Remote};
use crate::services::{
    AuthService, CashSessionService, PermissionProfileService, ProductService, PurchaseService,
    SaleService, UserService,
};
use crate::worker::TaskQueue;

/// Shared state behind every service.
pub struct DataContext {
    pub(crate) remote: Remote,
    pub(crate) auth: Arc<dyn AuthProvider>,
    pub(crate) cache: Arc<CacheService>,
    pub(crate) queue: Arc<TaskQueue>,
    pub(crate) audit: AuditLogger,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: DataConfig,
    tz: FixedOffset,
}

impl DataContext {
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn tz(&self) -> &FixedOffset {
        &self.tz
    }

    /// The shop's current calendar day.
    pub(crate) fn today(&self) -> NaiveDate {
        local_date(self.now(), &self.tz)
    }

    pub(crate) fn volatile_ttl(&self) -> Duration {
        self.config.volatile_ttl()
    }

    pub(crate) fn static_ttl(&self) -> Duration {
        self.config.static_ttl()
    }

    /// Runs a one-shot auth call under the configured timeout.
    pub(crate) async fn auth_call<T, F, Fut>(&self, message: &str, op: F) -> DataResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn AuthProvider>) -> Fut,
        Fut: std::future::Future<Output = DataResult<T>> + Send + 'static,
    {
        with_timeout(op(self.auth.clone()), self.config.call_timeout(), message).await
    }

    /// Delivers `event` from the background queue.
    pub(crate) fn notify(&self, event: NotifyEvent) {
        let notifier = self.notifier.clone();
        self.queue.submit("notify", async move { notifier.notify(&event).await });
    }
}

// =============================================================================
// Builder
// =============================================================================

pub struct DataLayerBuilder {
    config: DataConfig,
    store: Option<Arc<dyn RemoteStore>>,
    auth: Option<Arc<dyn AuthProvider>>,
    bus: Option<Arc<dyn InvalidationBus>>,
    clock: Option<Arc<dyn Clock>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl DataLayerBuilder {
    pub fn store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn bus(mut self, bus: Arc<dyn InvalidationBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Must run inside a tokio runtime: starts the task queue and the cache
    /// sync listener.
    pub fn build(self) -> DataResult<DataLayer> {
        self.config.validate()?;
        let store = self
            .store
            .ok_or_else(|| DataError::InvalidConfig("a remote store is required".into()))?;

        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(n) => n,
            None if self.config.notifications.enabled => Arc::new(WebhookNotifier::new(
                &self.config.notifications,
                self.config.locale.currency.clone(),
            )?),
            None => Arc::new(NoopNotifier),
        };

        let bus = self.bus.unwrap_or_else(|| Arc::new(NoopBus));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let auth = self.auth.unwrap_or_else(|| Arc::new(MemoryAuth::new()));

        let remote = Remote::new(store, self.config.retry_policy(), self.config.call_timeout());
        let queue = Arc::new(TaskQueue::spawn());
        let cache = Arc::new(CacheService::new(bus));
        let listener = cache.start_listener();
        let audit = AuditLogger::new(remote.clone(), queue.clone(), clock.clone());
        let tz = self.config.tz();

        info!(
            origin = %cache.origin(),
            utc_offset_secs = tz.local_minus_utc(),
            cross_instance = listener.is_some(),
            "Data layer ready"
        );

        let ctx = Arc::new(DataContext {
            remote,
            auth,
            cache,
            queue,
            audit,
            notifier,
            clock,
            config: self.config,
            tz,
        });

        let cash_sessions = CashSessionService::new(ctx.clone());
        let products = ProductService::new(ctx.clone());
        Ok(DataLayer {
            sales: SaleService::new(ctx.clone(), products.clone(), cash_sessions.clone()),
            purchases: PurchaseService::new(ctx.clone(), products.clone()),
            users: UserService::new(ctx.clone()),
            permission_profiles: PermissionProfileService::new(ctx.clone()),
            auth: AuthService::new(ctx.clone()),
            cash_sessions,
            products,
            listener,
            ctx,
        })
    }
}

// =============================================================================
// DataLayer
// =============================================================================

pub struct DataLayer {
    ctx: Arc<DataContext>,
    cash_sessions: CashSessionService,
    products: ProductService,
    sales: SaleService,
    purchases: PurchaseService,
    users: UserService,
    permission_profiles: PermissionProfileService,
    auth: AuthService,
    listener: Option<JoinHandle<()>>,
}

impl DataLayer {
    pub fn builder(config: DataConfig) -> DataLayerBuilder {
        DataLayerBuilder {
            config,
            store: None,
            auth: None,
            bus: None,
            clock: None,
            notifier: None,
        }
    }

    /// Opens the SQLite store named in `config` (in-memory when unset).
    pub async fn connect(config: DataConfig) -> DataResult<DataLayer> {
        let sqlite = match &config.remote.database_path {
            Some(path) => SqliteConfig::new(path.clone()),
            None => SqliteConfig::in_memory(),
        };
        let store = SqliteStore::connect(sqlite).await?;
        Self::builder(config).store(Arc::new(store)).build()
    }

    pub fn cash_sessions(&self) -> &CashSessionService {
        &self.cash_sessions
    }

    pub fn products(&self) -> &ProductService {
        &self.products
    }

    pub fn sales(&self) -> &SaleService {
        &self.sales
    }

    pub fn purchases(&self) -> &PurchaseService {
        &self.purchases
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn permission_profiles(&self) -> &PermissionProfileService {
        &self.permission_profiles
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.ctx.cache
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.ctx.queue
    }

    pub fn config(&self) -> &DataConfig {
        &self.ctx.config
    }

    /// Fires on every local or remote invalidation.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<DataChanged> {
        self.ctx.cache.subscribe_changes()
    }

    /// Waits for queued background work (audit writes, repairs, webhooks).
    pub async fn flush(&self) {
        self.ctx.queue.flush().await;
    }

    pub async fn shutdown(&self) {
        debug!("Shutting down data layer");
        self.ctx.queue.shutdown().await;
        if let Some(listener) = &self.listener {
            listener.abort();
        }
        info!("Data layer stopped");
    }
}

impl Drop for DataLayer {
    fn drop(&mut self) {
        if let Some(listener) = &self.listener {
            listener.abort();
        }
    }
}
