//! Permission profiles. Near-static, so cached with the long TTL.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shopdesk_core::validation::validate_name;
use shopdesk_core::{Actor, AuditAction, AuditEntity, Permission, PermissionProfile};
use shopdesk_store::{resources, Direction, Query, StoreError};
use uuid::Uuid;

use crate::context::DataContext;
use crate::error::{DataError, DataResult};
use crate::services::users::require_manage_users;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPermissionProfile {
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<BTreeSet<Permission>>,
}

#[derive(Clone)]
pub struct PermissionProfileService {
    ctx: Arc<DataContext>,
}

impl PermissionProfileService {
    pub(crate) fn new(ctx: Arc<DataContext>) -> Self {
        Self { ctx }
    }

    pub async fn list(&self) -> DataResult<Vec<PermissionProfile>> {
        let remote = self.ctx.remote.clone();
        let query = Query::new(resources::PERMISSION_PROFILES).order_by("name", Direction::Asc);
        self.ctx
            .cache
            .fetch_with_cache(
                resources::PERMISSION_PROFILES,
                self.ctx.static_ttl(),
                || async move { remote.select_as::<PermissionProfile>(&query).await },
            )
            .await
    }

    pub async fn get(&self, id: &str) -> DataResult<PermissionProfile> {
        self.ctx
            .remote
            .get_as::<PermissionProfile>(resources::PERMISSION_PROFILES, id)
            .await?
            .ok_or_else(|| DataError::not_found(resources::PERMISSION_PROFILES, id))
    }

    pub async fn create(&self, actor: &Actor, input: NewPermissionProfile) -> DataResult<PermissionProfile> {
        require_manage_users(actor)?;
        validate_name("name", &input.name)?;

        let profile = PermissionProfile {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            is_admin: input.is_admin,
            permissions: input.permissions,
        };
        let profile: PermissionProfile = self
            .ctx
            .remote
            .insert_model(resources::PERMISSION_PROFILES, &profile, None)
            .await?;

        self.ctx
            .cache
            .clear_cache(&[resources::PERMISSION_PROFILES])
            .await;
        self.ctx.audit.record(
            actor,
            AuditAction::Create,
            AuditEntity::PermissionProfile,
            &profile.id,
            profile.name.clone(),
        );
        Ok(profile)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: &str,
        changes: PermissionProfileUpdate,
    ) -> DataResult<PermissionProfile> {
        require_manage_users(actor)?;
        if let Some(name) = &changes.name {
            validate_name("name", name)?;
        }
        self.get(id).await?;

        let profile: PermissionProfile = self
            .ctx
            .remote
            .update_as(resources::PERMISSION_PROFILES, id, &changes)
            .await?;

        self.ctx
            .cache
            .clear_cache(&[resources::PERMISSION_PROFILES])
            .await;
        self.ctx.audit.record(
            actor,
            AuditAction::Update,
            AuditEntity::PermissionProfile,
            id,
            serde_json::to_string(&changes)
                .map_err(StoreError::from)?,
        );
        Ok(profile)
    }
}
