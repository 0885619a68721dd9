//! # Data Layer Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SHOPDESK_UTC_OFFSET_MINUTES=-180                                   │
//! │     SHOPDESK_BOT_TOKEN=...                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/shopdesk/shopdesk.toml (Linux)                           │
//! │     ~/Library/Application Support/com.shopdesk.shopdesk/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [cache]
//! volatile_ttl_secs = 300      # products, sales, sessions, users
//! static_ttl_secs = 1800       # permission profiles
//! channel = "app_cache_sync"
//!
//! [remote]
//! call_timeout_secs = 15
//! retries = 3
//! retry_delay_ms = 1000
//! database_path = "/var/lib/shopdesk/shopdesk.db"
//!
//! [provisioning]
//! poll_interval_ms = 500
//! max_attempts = 10
//!
//! [notifications]
//! enabled = true
//! api_base = "https://api.telegram.org"
//! bot_token = "123:abc"
//! chat_id = "-100200300"
//!
//! [sales]
//! credit_surcharge_bps = 299
//!
//! [locale]
//! utc_offset_minutes = -180
//! ```

use chrono::{FixedOffset, Local, Offset};
use serde::{Deserialize, Serialize};
use shopdesk_core::CurrencyFormat;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DataError, DataResult};
use crate::resilience::RetryPolicy;

// =============================================================================
// Cache Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// TTL for resources that change during the day.
    #[serde(default = "default_volatile_ttl")]
    pub volatile_ttl_secs: u64,

    /// TTL for near-static metadata.
    #[serde(default = "default_static_ttl")]
    pub static_ttl_secs: u64,

    /// Name of the cross-instance invalidation channel.
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_volatile_ttl() -> u64 {
    300
}

fn default_static_ttl() -> u64 {
    1800
}

fn default_channel() -> String {
    "app_cache_sync".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            volatile_ttl_secs: default_volatile_ttl(),
            static_ttl_secs: default_static_ttl(),
            channel: default_channel(),
        }
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Per-call timeout applied inside the retry loop.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Retries after the first attempt, for transient failures only.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// First backoff delay; doubles on each retry.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// SQLite file for single-process deployments. In-memory when unset.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

fn default_call_timeout() -> u64 {
    15
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            call_timeout_secs: default_call_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            database_path: None,
        }
    }
}

// =============================================================================
// Provisioning Settings
// =============================================================================

/// Polling for the profile row the backend creates after sign-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval() -> u64 {
    500
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for ProvisioningSettings {
    fn default() -> Self {
        ProvisioningSettings {
            poll_interval_ms: default_poll_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

// =============================================================================
// Notification Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub chat_id: String,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            enabled: false,
            api_base: default_api_base(),
            bot_token: String::new(),
            chat_id: String::new(),
        }
    }
}

// =============================================================================
// Sales & Locale Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesSettings {
    /// Surcharge applied to credit sales split in more than one installment.
    #[serde(default)]
    pub credit_surcharge_bps: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocaleSettings {
    /// Shop's offset from UTC. The machine's current offset when unset.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,

    #[serde(default)]
    pub currency: CurrencyFormat,
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub provisioning: ProvisioningSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,

    #[serde(default)]
    pub sales: SalesSettings,

    #[serde(default)]
    pub locale: LocaleSettings,
}

impl DataConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (shopdesk.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DataResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading data layer config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load data layer config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> DataResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| DataError::ConfigIo("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Data layer config saved");
        Ok(())
    }

    pub fn validate(&self) -> DataResult<()> {
        if self.cache.volatile_ttl_secs == 0 || self.cache.static_ttl_secs == 0 {
            return Err(DataError::InvalidConfig(
                "cache TTLs must be greater than 0".into(),
            ));
        }
        if self.cache.channel.trim().is_empty() {
            return Err(DataError::InvalidConfig("cache channel must not be empty".into()));
        }
        if self.remote.call_timeout_secs == 0 {
            return Err(DataError::InvalidConfig(
                "call_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.provisioning.max_attempts == 0 {
            return Err(DataError::InvalidConfig(
                "provisioning max_attempts must be greater than 0".into(),
            ));
        }
        if let Some(minutes) = self.locale.utc_offset_minutes {
            if FixedOffset::east_opt(minutes.saturating_mul(60)).is_none() {
                return Err(DataError::InvalidConfig(format!(
                    "utc_offset_minutes out of range: {minutes}"
                )));
            }
        }

        if self.notifications.enabled {
            let base = url::Url::parse(&self.notifications.api_base)?;
            if base.scheme() != "https" && base.scheme() != "http" {
                return Err(DataError::InvalidConfig(format!(
                    "Notification api_base must be http(s), got: {}",
                    self.notifications.api_base
                )));
            }
            if self.notifications.bot_token.is_empty() || self.notifications.chat_id.is_empty() {
                return Err(DataError::InvalidConfig(
                    "notifications require bot_token and chat_id".into(),
                ));
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(offset) = std::env::var("SHOPDESK_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(m) => {
                    debug!(minutes = m, "Overriding UTC offset from environment");
                    self.locale.utc_offset_minutes = Some(m);
                }
                Err(_) => warn!(value = %offset, "Ignoring invalid SHOPDESK_UTC_OFFSET_MINUTES"),
            }
        }

        if let Ok(secs) = std::env::var("SHOPDESK_CALL_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.remote.call_timeout_secs = s;
            }
        }

        if let Ok(retries) = std::env::var("SHOPDESK_RETRIES") {
            if let Ok(r) = retries.parse::<u32>() {
                self.remote.retries = r;
            }
        }

        if let Ok(path) = std::env::var("SHOPDESK_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.remote.database_path = Some(PathBuf::from(path));
        }

        if let Ok(channel) = std::env::var("SHOPDESK_CACHE_CHANNEL") {
            self.cache.channel = channel;
        }

        if let Ok(enabled) = std::env::var("SHOPDESK_NOTIFY_ENABLED") {
            self.notifications.enabled = matches!(enabled.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Ok(token) = std::env::var("SHOPDESK_BOT_TOKEN") {
            self.notifications.bot_token = token;
        }

        if let Ok(chat) = std::env::var("SHOPDESK_CHAT_ID") {
            self.notifications.chat_id = chat;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "shopdesk", "shopdesk")
            .map(|dirs| dirs.config_dir().join("shopdesk.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The shop's calendar offset.
    pub fn tz(&self) -> FixedOffset {
        self.locale
            .utc_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m.saturating_mul(60)))
            .unwrap_or_else(|| Local::now().offset().fix())
    }

    pub fn volatile_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.volatile_ttl_secs)
    }

    pub fn static_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.static_ttl_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.call_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.remote.retries,
            initial_delay: Duration::from_millis(self.remote.retry_delay_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.provisioning.poll_interval_ms)
    }

    /// Builder-style override used by tests and embedders.
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.locale.utc_offset_minutes = Some(minutes);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DataConfig::default();
        assert_eq!(config.volatile_ttl(), Duration::from_secs(300));
        assert_eq!(config.static_ttl(), Duration::from_secs(1800));
        assert_eq!(config.cache.channel, "app_cache_sync");
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(!config.notifications.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: DataConfig = toml::from_str(
            r#"
            [remote]
            retries = 5

            [locale]
            utc_offset_minutes = -180
            "#,
        )
        .unwrap();
        assert_eq!(config.remote.retries, 5);
        assert_eq!(config.remote.call_timeout_secs, 15);
        assert_eq!(config.tz(), FixedOffset::west_opt(3 * 3600).unwrap());
        assert_eq!(config.cache.volatile_ttl_secs, 300);
    }

    #[test]
    fn test_validation() {
        let mut config = DataConfig::default();
        config.cache.volatile_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = DataConfig::default();
        config.notifications.enabled = true;
        assert!(config.validate().is_err());

        config.notifications.bot_token = "123:abc".into();
        config.notifications.chat_id = "42".into();
        assert!(config.validate().is_ok());

        config.notifications.api_base = "ftp://example.com".into();
        assert!(config.validate().is_err());

        config.notifications.api_base = "not a url".into();
        assert!(config.validate().is_err());

        let config = DataConfig::default().with_utc_offset_minutes(24 * 60);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_through_file() {
        let dir = std::env::temp_dir().join(format!("shopdesk-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("shopdesk.toml");

        let mut config = DataConfig::default().with_utc_offset_minutes(60);
        config.sales.credit_surcharge_bps = 299;
        config.save(Some(path.clone())).unwrap();

        let loaded = DataConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.sales.credit_surcharge_bps, 299);
        assert_eq!(loaded.locale.utc_offset_minutes, Some(60));

        let _ = std::fs::remove_dir_all(dir);
    }
}
