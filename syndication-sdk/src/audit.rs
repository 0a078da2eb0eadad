use async_trait::async_trait;
use syndication_store::{AuditEvent, AuditLog, StoreError};
use tracing::{info, warn};

use crate::actor::SYSTEM_ACTOR;

/// Audit sink that writes every event to `tracing` under the
/// `syndication::audit` target.
///
/// This is the sink a [`crate::Syndication`] service uses when none is
/// configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<(), StoreError> {
        info!(
            target: "syndication::audit",
            action = ?event.action,
            actor = event.actor.as_deref().unwrap_or(SYSTEM_ACTOR),
            consent_id = %event.consent_id,
            token_id = ?event.token_id,
            content = %event.content,
            site = %event.site_slug,
            detail = event.detail.as_deref().unwrap_or(""),
            "Syndication audit event"
        );
        Ok(())
    }
}

/// Hand `event` to the audit sink. A failing sink is logged and otherwise
/// ignored; it never fails the operation being audited.
pub(crate) async fn record(log: &dyn AuditLog, event: AuditEvent) {
    let action = event.action;
    let consent_id = event.consent_id;
    if let Err(e) = log.record(event).await {
        warn!(
            action = ?action,
            consent_id = %consent_id,
            error = %e,
            "Failed to write syndication audit event"
        );
    }
}
