//! Audit trail writer.
//!
//! Entries are built synchronously (so the timestamp is the moment of the
//! action) and inserted from the background queue. A failed audit write is
//! logged and never fails the action it describes.

use std::sync::Arc;

use shopdesk_core::{
    Actor, AuditAction, AuditEntity, AuditLogEntry, CashAuditMetadata, CashRegisterAuditRecord,
};
use shopdesk_store::resources;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::resilience::Remote;
use crate::worker::TaskQueue;

/// User id recorded for actions the layer takes on its own.
pub const SYSTEM_USER_ID: &str = "system";
pub const SYSTEM_USER_NAME: &str = "System";

#[derive(Clone)]
pub struct AuditLogger {
    remote: Remote,
    queue: Arc<TaskQueue>,
    clock: Arc<dyn Clock>,
}

impl AuditLogger {
    pub fn new(remote: Remote, queue: Arc<TaskQueue>, clock: Arc<dyn Clock>) -> Self {
        Self {
            remote,
            queue,
            clock,
        }
    }

    /// Actor used for automatic corrections such as the day-rollover close.
    pub fn system_actor() -> Actor {
        Actor {
            user_id: SYSTEM_USER_ID.to_string(),
            user_name: SYSTEM_USER_NAME.to_string(),
            is_admin: true,
            permissions: Default::default(),
        }
    }

    pub fn record(
        &self,
        actor: &Actor,
        action: AuditAction,
        entity: AuditEntity,
        entity_id: &str,
        details: impl Into<String>,
    ) -> AuditLogEntry {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: self.clock.now(),
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
            action,
            entity,
            entity_id: entity_id.to_string(),
            details: details.into(),
        };
        debug!(?action, %entity, entity_id, "Audit");

        let remote = self.remote.clone();
        let row = entry.clone();
        self.queue.submit("audit_log", async move {
            remote
                .insert_model(resources::AUDIT_LOGS, &row, None)
                .await
                .map(|_| ())
        });
        entry
    }

    pub fn record_cash_register(
        &self,
        actor: &Actor,
        action: AuditAction,
        session_id: &str,
        metadata: CashAuditMetadata,
    ) -> CashRegisterAuditRecord {
        let record = CashRegisterAuditRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: self.clock.now(),
            session_id: session_id.to_string(),
            user_id: actor.user_id.clone(),
            user_name: actor.user_name.clone(),
            action,
            metadata,
        };

        let remote = self.remote.clone();
        let row = record.clone();
        self.queue.submit("cash_register_audit", async move {
            remote
                .insert_model(resources::CASH_REGISTER_AUDIT_LOGS, &row, None)
                .await
                .map(|_| ())
        });
        record
    }
}
