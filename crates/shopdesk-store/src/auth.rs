//! # Auth Sub-Interface
//!
//! Password authentication as exposed by the hosted backend.
//!
//! ## Sign-up and the profile row
//! ```text
//! sign_up(email, password, metadata)
//!      │
//!      ▼
//! auth account created ──► (backend trigger, some time later)
//!                              │
//!                              ▼
//!                          `users` row { id, email, name, active }
//! ```
//! The profile row appears asynchronously; callers poll for it.
//! `MemoryAuth::with_profile_trigger` emulates that trigger.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::query::{Insert, Row};
use crate::remote::RemoteStore;

/// An authenticated account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub metadata: Row,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
    pub access_token: String,
}

/// Attributes accepted by `update_user`. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserAttributes {
    pub email: Option<String>,
    pub password: Option<String>,
    pub metadata: Option<Row>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> StoreResult<AuthSession>;

    /// Creates an account. Does not sign it in.
    async fn sign_up(&self, email: &str, password: &str, metadata: Row) -> StoreResult<AuthUser>;

    async fn sign_out(&self) -> StoreResult<()>;

    async fn update_user(&self, user_id: &str, attrs: UserAttributes) -> StoreResult<AuthUser>;

    /// The currently signed-in user, if any.
    async fn get_user(&self) -> StoreResult<Option<AuthUser>>;
}

// =============================================================================
// Memory Implementation
// =============================================================================

struct Account {
    user: AuthUser,
    password: String,
}

struct ProfileTrigger {
    store: Arc<dyn RemoteStore>,
    delay: Duration,
}

/// Process-local `AuthProvider` for tests and demos.
#[derive(Default)]
pub struct MemoryAuth {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<AuthUser>>,
    trigger: Option<ProfileTrigger>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// After each sign-up, insert a `users` profile row into `store` once
    /// `delay` has passed.
    pub fn with_profile_trigger(mut self, store: Arc<dyn RemoteStore>, delay: Duration) -> Self {
        self.trigger = Some(ProfileTrigger { store, delay });
        self
    }

    fn spawn_profile_row(&self, user: &AuthUser) {
        let Some(trigger) = &self.trigger else {
            return;
        };
        let store = trigger.store.clone();
        let delay = trigger.delay;
        let name = user
            .metadata
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&user.email)
            .to_string();

        let mut row = Row::new();
        row.insert("id".into(), Value::String(user.id.clone()));
        row.insert("email".into(), Value::String(user.email.clone()));
        row.insert("name".into(), Value::String(name));
        row.insert("active".into(), Value::Bool(true));
        row.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = store.insert(Insert::new(crate::resources::USERS, row)).await {
                warn!(error = %e, "Profile trigger failed to insert users row");
            }
        });
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> StoreResult<AuthSession> {
        let accounts = self.accounts.read().await;
        let account = accounts
            .get(&email.to_lowercase())
            .filter(|a| a.password == password)
            .ok_or_else(|| StoreError::Auth("Invalid login credentials".to_string()))?;

        let user = account.user.clone();
        *self.current.write().await = Some(user.clone());
        Ok(AuthSession {
            user,
            access_token: uuid::Uuid::new_v4().to_string(),
        })
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Row) -> StoreResult<AuthUser> {
        let key = email.to_lowercase();
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&key) {
            return Err(StoreError::Conflict("User already registered".to_string()));
        }

        let user = AuthUser {
            id: uuid::Uuid::new_v4().to_string(),
            email: key.clone(),
            metadata,
        };
        accounts.insert(
            key,
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        drop(accounts);

        info!(user_id = %user.id, "Auth account created");
        self.spawn_profile_row(&user);
        Ok(user)
    }

    async fn sign_out(&self) -> StoreResult<()> {
        *self.current.write().await = None;
        Ok(())
    }

    async fn update_user(&self, user_id: &str, attrs: UserAttributes) -> StoreResult<AuthUser> {
        let mut accounts = self.accounts.write().await;
        let old_key = accounts
            .iter()
            .find(|(_, a)| a.user.id == user_id)
            .map(|(k, _)| k.clone())
            .ok_or_else(|| StoreError::not_found("auth.users", user_id))?;

        let mut account = accounts
            .remove(&old_key)
            .ok_or_else(|| StoreError::not_found("auth.users", user_id))?;
        if let Some(email) = attrs.email {
            account.user.email = email.to_lowercase();
        }
        if let Some(password) = attrs.password {
            account.password = password;
        }
        if let Some(metadata) = attrs.metadata {
            account.user.metadata.extend(metadata);
        }
        let user = account.user.clone();
        accounts.insert(user.email.clone(), account);
        drop(accounts);

        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|c| c.id == user.id) {
            *current = Some(user.clone());
        }
        Ok(user)
    }

    async fn get_user(&self) -> StoreResult<Option<AuthUser>> {
        Ok(self.current.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::query::Query;

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let auth = MemoryAuth::new();
        let user = auth.sign_up("Tech@Shop.io", "hunter22", Row::new()).await.unwrap();
        assert_eq!(user.email, "tech@shop.io");
        assert!(auth.get_user().await.unwrap().is_none());

        let session = auth.sign_in_with_password("tech@shop.io", "hunter22").await.unwrap();
        assert_eq!(session.user.id, user.id);
        assert_eq!(auth.get_user().await.unwrap().map(|u| u.id), Some(user.id));

        auth.sign_out().await.unwrap();
        assert!(auth.get_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_and_duplicate_email() {
        let auth = MemoryAuth::new();
        auth.sign_up("a@b.co", "secret1", Row::new()).await.unwrap();
        assert!(matches!(
            auth.sign_in_with_password("a@b.co", "nope").await,
            Err(StoreError::Auth(_))
        ));
        assert!(auth.sign_up("A@B.CO", "x", Row::new()).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_update_user_changes_password() {
        let auth = MemoryAuth::new();
        let user = auth.sign_up("a@b.co", "secret1", Row::new()).await.unwrap();
        auth.update_user(
            &user.id,
            UserAttributes {
                password: Some("secret2".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(auth.sign_in_with_password("a@b.co", "secret1").await.is_err());
        assert!(auth.sign_in_with_password("a@b.co", "secret2").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_profile_trigger_inserts_row_after_delay() {
        let store = Arc::new(MemoryStore::new());
        let auth = MemoryAuth::new().with_profile_trigger(store.clone(), Duration::from_millis(1500));

        let mut meta = Row::new();
        meta.insert("name".into(), Value::String("Bruno".into()));
        let user = auth.sign_up("bruno@shop.io", "secret1", meta).await.unwrap();

        assert!(store.select(&Query::new("users")).await.unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(1600)).await;

        let rows = store.select(&Query::new("users")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], Value::String(user.id));
        assert_eq!(rows[0]["name"], "Bruno");
    }
}
