//! # Cross-Instance Cache Invalidation
//!
//! ```text
//! ┌──────────────┐    CLEAR_CACHE     ┌──────────────┐
//! │  Instance A  │ ─────────────────► │  Instance B  │
//! │  clear_cache │   app_cache_sync   │  listener    │
//! └──────────────┘                    └──────────────┘
//! ```
//!
//! Messages travel as JSON text so any transport that carries strings can
//! implement [`InvalidationBus`]:
//!
//! ```json
//! {"type":"CLEAR_CACHE","origin":"…","keys":["products"],"prefixes":["products"]}
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::DataResult;

/// Message exchanged between application instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheSyncMessage {
    ClearCache {
        /// Instance that performed the clear. Listeners skip their own.
        origin: Uuid,
        keys: Vec<String>,
        prefixes: Vec<String>,
    },
}

impl CacheSyncMessage {
    pub fn clear(origin: Uuid, keys: &[String]) -> Self {
        CacheSyncMessage::ClearCache {
            origin,
            keys: keys.to_vec(),
            prefixes: keys.to_vec(),
        }
    }

    pub fn to_json(&self) -> DataResult<String> {
        Ok(serde_json::to_string(self).map_err(shopdesk_store::StoreError::from)?)
    }

    pub fn from_json(raw: &str) -> DataResult<Self> {
        Ok(serde_json::from_str(raw).map_err(shopdesk_store::StoreError::from)?)
    }
}

/// Where an invalidation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    Local,
    Remote,
}

/// Local "data changed" notification, fired on every invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChanged {
    pub prefixes: Vec<String>,
    pub source: ChangeSource,
}

/// Transport for [`CacheSyncMessage`]s between instances.
pub trait InvalidationBus: Send + Sync {
    fn publish(&self, message: &CacheSyncMessage) -> DataResult<()>;

    /// `None` when the bus never delivers anything.
    fn subscribe(&self) -> Option<broadcast::Receiver<String>>;
}

/// Single-process bus: publishing is a no-op.
#[derive(Debug, Default, Clone)]
pub struct NoopBus;

impl InvalidationBus for NoopBus {
    fn publish(&self, message: &CacheSyncMessage) -> DataResult<()> {
        trace!(?message, "No invalidation bus, dropping message");
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<String>> {
        None
    }
}

/// In-process named channel. Clone it to hand the same channel to several
/// application instances.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    name: String,
    sender: broadcast::Sender<String>,
}

impl BroadcastBus {
    const CAPACITY: usize = 256;

    pub fn new(name: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(Self::CAPACITY);
        BroadcastBus {
            name: name.into(),
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl InvalidationBus for BroadcastBus {
    fn publish(&self, message: &CacheSyncMessage) -> DataResult<()> {
        let raw = message.to_json()?;
        // No receivers is not an error: other instances may not exist yet.
        match self.sender.send(raw) {
            Ok(n) => debug!(channel = %self.name, receivers = n, "Published cache sync message"),
            Err(_) => trace!(channel = %self.name, "No cache sync listeners"),
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<String>> {
        Some(self.sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let origin = Uuid::nil();
        let msg = CacheSyncMessage::clear(origin, &["products".to_string()]);
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "CLEAR_CACHE");
        assert_eq!(json["keys"], serde_json::json!(["products"]));
        assert_eq!(json["prefixes"], serde_json::json!(["products"]));
        assert_eq!(CacheSyncMessage::from_json(&msg.to_json().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_unknown_message_type_rejected() {
        assert!(CacheSyncMessage::from_json(r#"{"type":"PING"}"#).is_err());
    }

    #[tokio::test]
    async fn test_broadcast_bus_shared_between_clones() {
        let bus = BroadcastBus::new("app_cache_sync");
        let other = bus.clone();
        let mut rx = other.subscribe().unwrap();

        let msg = CacheSyncMessage::clear(Uuid::new_v4(), &["sales".to_string()]);
        bus.publish(&msg).unwrap();

        let raw = rx.recv().await.unwrap();
        assert_eq!(CacheSyncMessage::from_json(&raw).unwrap(), msg);
        assert_eq!(other.name(), "app_cache_sync");
    }

    #[test]
    fn test_noop_bus() {
        let bus = NoopBus;
        assert!(bus.subscribe().is_none());
        assert!(bus.publish(&CacheSyncMessage::clear(Uuid::nil(), &[])).is_ok());
    }
}
