//! # Cash Sessions
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cash Session Lifecycle                              │
//! │                                                                         │
//! │  open_register ──► [open] ──record_movement──► [open]                   │
//! │                      │                                                  │
//! │                      ├── close ────────────► [closed] ──reopen──► [open]│
//! │                      │                                   (admin or      │
//! │                      │                                    grant+reason) │
//! │                      └── day rollover ─────► [closed @ 23:59:59.999]    │
//! │                          (listing sees it,    persisted by a repair     │
//! │                           unless reopened)    task in the background)   │
//! │                                                                         │
//! │  One session per user per local calendar day, open or closed.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use shopdesk_core::dates::day_bounds;
use shopdesk_core::{
    daily_session_key, reconcile, Actor, AuditAction, AuditEntity, AutoClosure, CashAuditMetadata,
    CashMovement, CashSession, CoreError, Money, MovementKind, SessionStatus,
};
use shopdesk_store::{resources, Direction, Filter, Query};
use tracing::{debug, info, warn};

use crate::audit::AuditLogger;
use crate::context::DataContext;
use crate::error::DataResult;

/// Narrows `list_sessions`. The default lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
}

impl SessionFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            status: None,
        }
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Clone)]
pub struct CashSessionService {
    ctx: Arc<DataContext>,
    /// Sessions with a repair already queued.
    repairs: Arc<Mutex<HashSet<String>>>,
}

impl CashSessionService {
    pub(crate) fn new(ctx: Arc<DataContext>) -> Self {
        Self {
            ctx,
            repairs: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Opens today's register for `user_id`.
    ///
    /// ## Errors
    /// - `DuplicateSessionToday` if the user already has a session today,
    ///   open or closed
    /// - `MissingPermission` when opening for someone else without admin
    pub async fn open_register(
        &self,
        actor: &Actor,
        user_id: &str,
        opening_balance: Money,
    ) -> DataResult<CashSession> {
        if !actor.can_act_for(user_id) {
            return Err(CoreError::MissingPermission {
                action: "open a register for another user".into(),
            }
            .into());
        }

        let now = self.ctx.now();
        let today = self.ctx.today();

        if let Some(existing) = self.existing_for_day(user_id, today).await? {
            return Err(duplicate(&existing).into());
        }

        let total = self.ctx.remote.count(resources::CASH_SESSIONS, &[]).await?;
        let session = CashSession::open(user_id, total as i64 + 1, opening_balance, now)?;

        let inserted = self
            .ctx
            .remote
            .insert_model(
                resources::CASH_SESSIONS,
                &session,
                Some(daily_session_key(user_id, today)),
            )
            .await;

        let session = match inserted {
            Ok(session) => session,
            Err(e) if e.is_conflict() => {
                // Lost the race against another instance.
                let err = match self.existing_for_day(user_id, today).await? {
                    Some(existing) => duplicate(&existing),
                    None => CoreError::DuplicateSessionToday {
                        status: SessionStatus::Open,
                        opened_at: now,
                    },
                };
                return Err(err.into());
            }
            Err(e) => return Err(e),
        };

        info!(session_id = %session.id, display_id = session.display_id, user_id, "Cash register opened");
        self.ctx.cache.clear_cache(&[resources::CASH_SESSIONS]).await;
        self.ctx.audit.record(
            actor,
            AuditAction::Open,
            AuditEntity::CashSession,
            &session.id,
            format!(
                "Opened register #{} with {}",
                session.display_id,
                self.ctx.config.locale.currency.format(opening_balance)
            ),
        );
        Ok(session)
    }

    /// Appends a withdrawal or deposit.
    pub async fn record_movement(
        &self,
        actor: &Actor,
        session_id: &str,
        kind: MovementKind,
        amount: Money,
        reason: &str,
    ) -> DataResult<CashSession> {
        let movement = CashMovement::new(kind, amount, reason, self.ctx.now())?;
        let session = self.load_owned(actor, session_id).await?;
        self.append_movement(actor, session, movement).await
    }

    pub async fn close(&self, actor: &Actor, session_id: &str) -> DataResult<CashSession> {
        let mut session = self.load_owned(actor, session_id).await?;
        session.close(self.ctx.now())?;

        let session: CashSession = self
            .ctx
            .remote
            .update_as(
                resources::CASH_SESSIONS,
                &session.id,
                &json!({ "status": session.status, "closeTime": session.close_time }),
            )
            .await?;

        info!(session_id, cash = %session.cash_in_register, "Cash register closed");
        self.ctx.cache.clear_cache(&[resources::CASH_SESSIONS]).await;
        self.ctx.audit.record(
            actor,
            AuditAction::Close,
            AuditEntity::CashSession,
            &session.id,
            format!(
                "Closed register #{} with {} in cash",
                session.display_id,
                self.ctx.config.locale.currency.format(session.cash_in_register)
            ),
        );
        self.ctx.audit.record_cash_register(
            actor,
            AuditAction::Close,
            &session.id,
            CashAuditMetadata {
                amount: Some(session.cash_in_register),
                ..Default::default()
            },
        );
        Ok(session)
    }

    /// Reopens a closed session. Requires admin or the reopen grant.
    pub async fn reopen(&self, actor: &Actor, session_id: &str, reason: &str) -> DataResult<CashSession> {
        if !actor.can_reopen_cash() {
            return Err(CoreError::MissingPermission {
                action: "reopen a cash session".into(),
            }
            .into());
        }

        let mut session = self.load(session_id).await?;
        session.reopen(&actor.user_id, reason, self.ctx.now())?;

        let session: CashSession = self
            .ctx
            .remote
            .update_as(
                resources::CASH_SESSIONS,
                &session.id,
                &json!({
                    "status": session.status,
                    "closeTime": null,
                    "reopenedBy": session.reopened_by,
                    "reopenedAt": session.reopened_at,
                    "reopenReason": session.reopen_reason,
                }),
            )
            .await?;

        info!(session_id, by = %actor.user_id, "Cash register reopened");
        self.ctx.cache.clear_cache(&[resources::CASH_SESSIONS]).await;
        self.ctx.audit.record(
            actor,
            AuditAction::Reopen,
            AuditEntity::CashSession,
            &session.id,
            format!("Reopened register #{}: {}", session.display_id, reason.trim()),
        );
        self.ctx.audit.record_cash_register(
            actor,
            AuditAction::Reopen,
            &session.id,
            CashAuditMetadata {
                reason: session.reopen_reason.clone(),
                ..Default::default()
            },
        );
        Ok(session)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Sessions newest first, with the day rollover applied.
    pub async fn list_sessions(&self, filter: &SessionFilter) -> DataResult<Vec<CashSession>> {
        let key = cache_key(filter)?;
        let remote = self.ctx.remote.clone();
        let mut query = Query::new(resources::CASH_SESSIONS).order_by("open_time", Direction::Desc);
        if let Some(user_id) = &filter.user_id {
            query = query.filter(Filter::eq("user_id", user_id.as_str()));
        }

        let sessions = self
            .ctx
            .cache
            .fetch_with_cache(&key, self.ctx.volatile_ttl(), || async move {
                remote.select_as::<CashSession>(&query).await
            })
            .await?;

        let mut sessions = self.reconciled(sessions);
        if let Some(status) = filter.status {
            sessions.retain(|s| s.status == status);
        }
        Ok(sessions)
    }

    pub async fn get_session(&self, session_id: &str) -> DataResult<CashSession> {
        self.load(session_id).await
    }

    /// The user's session for the current day, if any.
    pub async fn session_for_today(&self, user_id: &str) -> DataResult<Option<CashSession>> {
        self.existing_for_day(user_id, self.ctx.today()).await
    }

    // =========================================================================
    // Cash Sales
    // =========================================================================

    /// Deposits the cash leg of a sale into the seller's open session for
    /// today. Returns the session id, or `None` when no register is open.
    pub(crate) async fn deposit_sale(
        &self,
        actor: &Actor,
        sale_id: &str,
        amount: Money,
    ) -> DataResult<Option<String>> {
        let Some(session) = self.session_for_today(&actor.user_id).await? else {
            debug!(sale_id, "No register open, cash sale not deposited");
            return Ok(None);
        };
        if !session.is_open() {
            return Ok(None);
        }

        let movement = CashMovement::new(
            MovementKind::Deposit,
            amount,
            &format!("Sale {sale_id}"),
            self.ctx.now(),
        )?
        .for_sale(sale_id);
        let session = self.append_movement(actor, session, movement).await?;
        Ok(Some(session.id))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn append_movement(
        &self,
        actor: &Actor,
        mut session: CashSession,
        movement: CashMovement,
    ) -> DataResult<CashSession> {
        session.apply_movement(movement.clone())?;

        let session: CashSession = self
            .ctx
            .remote
            .update_as(
                resources::CASH_SESSIONS,
                &session.id,
                &json!({
                    "cashInRegister": session.cash_in_register,
                    "withdrawals": session.withdrawals,
                    "deposits": session.deposits,
                    "movements": session.movements,
                }),
            )
            .await?;

        debug!(session_id = %session.id, kind = movement.kind.as_str(), amount = %movement.amount, "Cash movement recorded");
        self.ctx.cache.clear_cache(&[resources::CASH_SESSIONS]).await;
        self.ctx.audit.record(
            actor,
            movement.kind.into(),
            AuditEntity::CashSession,
            &session.id,
            format!(
                "{} of {}: {}",
                movement.kind.as_str(),
                self.ctx.config.locale.currency.format(movement.amount),
                movement.reason
            ),
        );
        self.ctx.audit.record_cash_register(
            actor,
            movement.kind.into(),
            &session.id,
            CashAuditMetadata {
                amount: Some(movement.amount),
                reason: Some(movement.reason.clone()),
                movement_type: Some(movement.kind),
            },
        );
        Ok(session)
    }

    /// Fresh read with the rollover applied.
    async fn load(&self, session_id: &str) -> DataResult<CashSession> {
        let session = self
            .ctx
            .remote
            .get_as::<CashSession>(resources::CASH_SESSIONS, session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))?;

        let mut sessions = self.reconciled(vec![session]);
        sessions
            .pop()
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()).into())
    }

    async fn load_owned(&self, actor: &Actor, session_id: &str) -> DataResult<CashSession> {
        let session = self.load(session_id).await?;
        if !actor.can_act_for(&session.user_id) {
            return Err(CoreError::NotSessionOwner {
                session_id: session_id.to_string(),
                user_id: actor.user_id.clone(),
            }
            .into());
        }
        Ok(session)
    }

    async fn existing_for_day(&self, user_id: &str, day: NaiveDate) -> DataResult<Option<CashSession>> {
        let (start, end) = day_bounds(day, self.ctx.tz());
        let query = Query::new(resources::CASH_SESSIONS)
            .filter(Filter::eq("user_id", user_id))
            .filter(Filter::gte("open_time", start.to_rfc3339()))
            .filter(Filter::lt("open_time", end.to_rfc3339()))
            .order_by("open_time", Direction::Desc)
            .limit(1);
        let sessions = self.ctx.remote.select_as::<CashSession>(&query).await?;
        Ok(sessions.into_iter().next())
    }

    /// Applies the rollover and queues persistence of what it changed.
    fn reconciled(&self, sessions: Vec<CashSession>) -> Vec<CashSession> {
        let result = reconcile(sessions, self.ctx.today(), self.ctx.tz());
        if !result.auto_closed.is_empty() {
            self.schedule_repair(result.auto_closed);
        }
        result.sessions
    }

    fn schedule_repair(&self, closures: Vec<AutoClosure>) {
        let pending: Vec<AutoClosure> = match self.repairs.lock() {
            Ok(mut in_flight) => closures
                .into_iter()
                .filter(|c| in_flight.insert(c.session_id.clone()))
                .collect(),
            Err(_) => closures,
        };
        if pending.is_empty() {
            return;
        }

        debug!(count = pending.len(), "Queueing stale session repair");
        let ctx = self.ctx.clone();
        let repairs = self.repairs.clone();
        self.ctx.queue.submit("cash_session_repair", async move {
            let result = repair(&ctx, &pending).await;
            if let Ok(mut in_flight) = repairs.lock() {
                for closure in &pending {
                    in_flight.remove(&closure.session_id);
                }
            }
            result
        });
    }
}

/// Persists rollover closures. Each row is re-read first so a session
/// reopened in the meantime is left alone.
async fn repair(ctx: &DataContext, closures: &[AutoClosure]) -> DataResult<()> {
    let today = ctx.today();
    let system = AuditLogger::system_actor();
    let mut repaired = 0usize;

    for closure in closures {
        let current = ctx
            .remote
            .get_as::<CashSession>(resources::CASH_SESSIONS, &closure.session_id)
            .await;
        let current = match current {
            Ok(Some(session)) => session,
            Ok(None) => continue,
            Err(e) => {
                warn!(session_id = %closure.session_id, error = %e, "Could not re-read stale session");
                continue;
            }
        };
        if !current.needs_auto_close(today, ctx.tz()) {
            continue;
        }

        let patch = json!({ "status": SessionStatus::Closed, "closeTime": closure.close_time });
        match ctx
            .remote
            .update_as::<CashSession, _>(resources::CASH_SESSIONS, &closure.session_id, &patch)
            .await
        {
            Ok(_) => {
                repaired += 1;
                ctx.audit.record(
                    &system,
                    AuditAction::AutoClose,
                    AuditEntity::CashSession,
                    &closure.session_id,
                    format!("Closed by day rollover at {}", closure.close_time.to_rfc3339()),
                );
            }
            Err(e) => warn!(session_id = %closure.session_id, error = %e, "Failed to persist auto-close"),
        }
    }

    if repaired > 0 {
        info!(repaired, "Stale cash sessions closed");
        ctx.cache.clear_cache(&[resources::CASH_SESSIONS]).await;
    }
    Ok(())
}

fn duplicate(existing: &CashSession) -> CoreError {
    CoreError::DuplicateSessionToday {
        status: existing.status,
        opened_at: existing.open_time,
    }
}

fn cache_key(filter: &SessionFilter) -> DataResult<String> {
    if filter.user_id.is_none() {
        return Ok(resources::CASH_SESSIONS.to_string());
    }
    let scoped = SessionFilter {
        user_id: filter.user_id.clone(),
        status: None,
    };
    let json = serde_json::to_string(&scoped).map_err(shopdesk_store::StoreError::from)?;
    Ok(format!("{}_{}", resources::CASH_SESSIONS, json))
}
