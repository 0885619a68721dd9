//! # User Administration
//!
//! ## Provisioning Flow
//! ```text
//! provision(actor, NewUser)
//!      │
//!      ▼
//! auth.sign_up(email, password, {name})        (timeout, no retry)
//!      │
//!      ▼
//! backend trigger inserts users row  ·····►  poll users[id]
//!                                            every poll_interval
//!                                            up to max_attempts
//!      │                                          │
//!      │ found                                    │ never found
//!      ▼                                          ▼
//! update name / profile / active        ProvisioningTimedOut
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shopdesk_core::validation::{validate_email, validate_name, validate_password};
use shopdesk_core::{Actor, AuditAction, AuditEntity, CoreError, Permission, UserProfile};
use shopdesk_store::{resources, Direction, Query, Row};
use tracing::{debug, info};

use crate::context::DataContext;
use crate::error::{DataError, DataResult};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub permission_profile_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_profile_id: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    ctx: Arc<DataContext>,
}

impl UserService {
    pub(crate) fn new(ctx: Arc<DataContext>) -> Self {
        Self { ctx }
    }

    pub async fn list(&self) -> DataResult<Vec<UserProfile>> {
        let remote = self.ctx.remote.clone();
        let query = Query::new(resources::USERS).order_by("name", Direction::Asc);
        self.ctx
            .cache
            .fetch_with_cache(resources::USERS, self.ctx.volatile_ttl(), || async move {
                remote.select_as::<UserProfile>(&query).await
            })
            .await
    }

    pub async fn get(&self, id: &str) -> DataResult<UserProfile> {
        self.ctx
            .remote
            .get_as::<UserProfile>(resources::USERS, id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(id.to_string()).into())
    }

    pub async fn update(&self, actor: &Actor, id: &str, changes: UserUpdate) -> DataResult<UserProfile> {
        require_manage_users(actor)?;
        if let Some(name) = &changes.name {
            validate_name("name", name)?;
        }
        self.get(id).await?;

        let user: UserProfile = self
            .ctx
            .remote
            .update_as(resources::USERS, id, &changes)
            .await?;

        self.ctx.cache.clear_cache(&[resources::USERS]).await;
        self.ctx.audit.record(
            actor,
            AuditAction::Update,
            AuditEntity::User,
            id,
            serde_json::to_string(&changes).unwrap_or_default(),
        );
        Ok(user)
    }

    /// Soft delete. Users cannot deactivate themselves.
    pub async fn deactivate(&self, actor: &Actor, id: &str) -> DataResult<UserProfile> {
        require_manage_users(actor)?;
        if actor.user_id == id {
            return Err(DataError::Forbidden("you cannot deactivate your own account".into()));
        }
        self.set_active(actor, id, false).await
    }

    pub async fn reactivate(&self, actor: &Actor, id: &str) -> DataResult<UserProfile> {
        require_manage_users(actor)?;
        self.set_active(actor, id, true).await
    }

    /// Creates an auth account and waits for its profile row to appear.
    pub async fn provision(&self, actor: &Actor, input: NewUser) -> DataResult<UserProfile> {
        require_manage_users(actor)?;
        validate_name("name", &input.name)?;
        validate_email(&input.email)?;
        validate_password(&input.password)?;

        let name = input.name.trim().to_string();
        let email = input.email.trim().to_lowercase();

        let mut metadata = Row::new();
        metadata.insert("name".into(), Value::String(name.clone()));
        let account = {
            let email = email.clone();
            let password = input.password.clone();
            self.ctx
                .auth_call("Timed out creating the account", move |auth| async move {
                    auth.sign_up(&email, &password, metadata).await.map_err(DataError::from)
                })
                .await?
        };
        info!(user_id = %account.id, "Auth account created, waiting for profile");

        self.wait_for_profile(&account.id, &email).await?;

        let user: UserProfile = self
            .ctx
            .remote
            .update_as(
                resources::USERS,
                &account.id,
                &json!({
                    "name": name,
                    "permissionProfileId": input.permission_profile_id,
                    "active": true,
                }),
            )
            .await?;

        self.ctx.cache.clear_cache(&[resources::USERS]).await;
        self.ctx.audit.record(
            actor,
            AuditAction::Create,
            AuditEntity::User,
            &user.id,
            format!("Provisioned {} <{}>", user.name, user.email),
        );
        Ok(user)
    }

    async fn wait_for_profile(&self, user_id: &str, email: &str) -> DataResult<()> {
        let attempts = self.ctx.config.provisioning.max_attempts;
        let interval = self.ctx.config.poll_interval();

        for attempt in 1..=attempts {
            let found = self
                .ctx
                .remote
                .get_as::<UserProfile>(resources::USERS, user_id)
                .await?;
            if found.is_some() {
                debug!(user_id, attempt, "Profile row found");
                return Ok(());
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(DataError::ProvisioningTimedOut {
            email: email.to_string(),
            attempts,
        })
    }

    async fn set_active(&self, actor: &Actor, id: &str, active: bool) -> DataResult<UserProfile> {
        self.get(id).await?;
        let user: UserProfile = self
            .ctx
            .remote
            .update_as(resources::USERS, id, &json!({ "active": active }))
            .await?;

        info!(user_id = id, active, "User status changed");
        self.ctx.cache.clear_cache(&[resources::USERS]).await;
        let action = if active {
            AuditAction::Reactivate
        } else {
            AuditAction::Deactivate
        };
        self.ctx
            .audit
            .record(actor, action, AuditEntity::User, id, user.name.clone());
        Ok(user)
    }
}

pub(crate) fn require_manage_users(actor: &Actor) -> DataResult<()> {
    if actor.has(Permission::ManageUsers) {
        Ok(())
    } else {
        Err(CoreError::MissingPermission {
            action: "manage users".into(),
        }
        .into())
    }
}
