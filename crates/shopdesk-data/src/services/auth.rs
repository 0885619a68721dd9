//! Sign-in / sign-out, resolving the signed-in user into an [`Actor`].

use std::sync::Arc;

use shopdesk_core::{Actor, AuditAction, AuditEntity, CoreError, PermissionProfile, UserProfile};
use shopdesk_store::resources;
use tracing::{info, warn};

use crate::context::DataContext;
use crate::error::{DataError, DataResult};

#[derive(Clone)]
pub struct AuthService {
    ctx: Arc<DataContext>,
}

impl AuthService {
    pub(crate) fn new(ctx: Arc<DataContext>) -> Self {
        Self { ctx }
    }

    /// ## Errors
    /// - `StoreError::Auth` for wrong credentials
    /// - `UserNotFound` when no profile row exists for the account
    /// - `UserInactive` for deactivated users (the session is signed out)
    pub async fn sign_in(&self, email: &str, password: &str) -> DataResult<Actor> {
        let email = email.trim().to_lowercase();
        let password = password.to_string();
        let session = self
            .ctx
            .auth_call("Timed out signing in", move |auth| async move {
                auth.sign_in_with_password(&email, &password).await.map_err(DataError::from)
            })
            .await?;

        let user = self
            .ctx
            .remote
            .get_as::<UserProfile>(resources::USERS, &session.user.id)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(session.user.id.clone()))?;

        if !user.active {
            if let Err(e) = self.ctx.auth.sign_out().await {
                warn!(error = %e, "Sign-out of inactive user failed");
            }
            return Err(CoreError::UserInactive(user.id).into());
        }

        let profile = match &user.permission_profile_id {
            Some(profile_id) => {
                self.ctx
                    .remote
                    .get_as::<PermissionProfile>(resources::PERMISSION_PROFILES, profile_id)
                    .await?
            }
            None => None,
        };

        let actor = Actor::new(&user, profile.as_ref());
        info!(user_id = %actor.user_id, is_admin = actor.is_admin, "Signed in");
        self.ctx
            .audit
            .record(&actor, AuditAction::SignIn, AuditEntity::User, &actor.user_id, "");
        Ok(actor)
    }

    /// Signs out and drops every cached entry.
    pub async fn sign_out(&self, actor: &Actor) -> DataResult<()> {
        self.ctx
            .auth_call("Timed out signing out", |auth| async move {
                auth.sign_out().await.map_err(DataError::from)
            })
            .await?;
        self.ctx.cache.invalidate_all().await;
        self.ctx
            .audit
            .record(actor, AuditAction::SignOut, AuditEntity::User, &actor.user_id, "");
        Ok(())
    }
}
