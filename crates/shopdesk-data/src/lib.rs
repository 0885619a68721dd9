//! # shopdesk-data: Caching & Synchronized Data Access
//!
//! Everything between the UI and the remote store: a TTL cache with
//! cross-instance invalidation, a timeout/retry wrapper around every remote
//! call, and the domain services that enforce the shop's business rules.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          UI (out of scope)                              │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │  DataLayer::cash_sessions() ...
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  services::*                                                            │
//! │   reads  ──► CacheService::fetch_with_cache ──► Remote (retry+timeout)  │
//! │   writes ──► Remote ──► CacheService::clear_cache ──► InvalidationBus   │
//! │                    └──► AuditLogger / Notifier ──► TaskQueue            │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  shopdesk-store: RemoteStore + AuthProvider (memory, sqlite)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`cache`] - TTL cache and prefix invalidation
//! - [`invalidation`] - `CLEAR_CACHE` messages between instances
//! - [`resilience`] - `with_timeout`, `fetch_with_retry`, [`Remote`]
//! - [`worker`] - background task queue
//! - [`audit`] - audit trail writer
//! - [`notify`] - outbound chat webhook
//! - [`services`] - cash sessions, products, sales, purchases, users
//! - [`config`] - TOML + environment configuration
//! - [`api_error`] - what a UI receives on failure
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopdesk_data::{DataConfig, DataLayer};
//! use shopdesk_core::Money;
//!
//! let layer = DataLayer::connect(DataConfig::load_or_default(None)).await?;
//! let actor = layer.auth().sign_in("ana@shop.io", "secret").await?;
//!
//! let session = layer
//!     .cash_sessions()
//!     .open_register(&actor, &actor.user_id, Money::from_cents(10_000))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api_error;
pub mod audit;
pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod invalidation;
pub mod notify;
pub mod resilience;
pub mod services;
pub mod worker;

// =============================================================================
// Re-exports
// =============================================================================

pub use api_error::{ApiError, ErrorCode};
pub use audit::AuditLogger;
pub use cache::CacheService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DataConfig;
pub use context::{DataContext, DataLayer, DataLayerBuilder};
pub use error::{DataError, DataResult};
pub use invalidation::{BroadcastBus, CacheSyncMessage, ChangeSource, DataChanged, InvalidationBus, NoopBus};
pub use notify::{NoopNotifier, Notifier, NotifyEvent, WebhookNotifier};
pub use resilience::{fetch_with_retry, with_timeout, Remote, RetryPolicy};
pub use services::*;
pub use worker::TaskQueue;
