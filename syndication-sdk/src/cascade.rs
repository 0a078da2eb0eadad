use chrono::Duration;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use syndication_store::{
    AuditAction, AuditEvent, AuditLog, ConsentId, ConsentRecord, ConsentStatus, ConsentStore,
    ConsentTransition, ContentDirectory, ContentRef, Revocation, TokenId, TokenStatus,
    TokenStore,
};
use tracing::info;

use crate::actor::{ensure_owner_or_elevated, Actor, SYSTEM_ACTOR};
use crate::audit;
use crate::clock::Clock;
use crate::error::SyndicationError;

/// Outcome of revoking one consent record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsentRevocation {
    pub record: ConsentRecord,
    /// Tokens that were still active and have now been revoked
    pub tokens_revoked: Vec<TokenId>,
}

/// Outcome of [`RevocationCascade::revoke_for_content_removed`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub consents_revoked: usize,
    /// Pending requests closed so they can never be approved later
    pub consents_denied: usize,
    pub tokens_revoked: usize,
}

/// What [`RevocationCascade::revoke_for_content_removed`] would change if it
/// ran now
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RemovalPreview {
    pub consents_to_revoke: usize,
    pub consents_to_deny: usize,
    pub tokens_to_revoke: usize,
    /// Requests served so far by every token for the item
    pub total_requests: u64,
}

/// Propagates consent revocation to every token issued under it.
///
/// Each step is a conditional update in the stores, so repeating a cascade,
/// or racing two of them, leaves the same end state.
#[derive(Clone)]
pub struct RevocationCascade {
    consents: Arc<dyn ConsentStore>,
    tokens: Arc<dyn TokenStore>,
    content: Arc<dyn ContentDirectory>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl RevocationCascade {
    pub fn new(
        consents: Arc<dyn ConsentStore>,
        tokens: Arc<dyn TokenStore>,
        content: Arc<dyn ContentDirectory>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            consents,
            tokens,
            content,
            audit,
            clock,
        }
    }

    /// Revoke every active token minted from `consent_id`.
    ///
    /// Idempotent: tokens that are already revoked or expired are left as
    /// they are, and a second call returns an empty list.
    pub async fn revoke_for_consent(
        &self,
        consent_id: &ConsentId,
        reason: &str,
    ) -> Result<Vec<TokenId>, SyndicationError> {
        let record = self
            .consents
            .get(consent_id)
            .await?
            .ok_or(SyndicationError::ConsentNotFound(*consent_id))?;

        self.revoke_tokens(&record, reason, None).await
    }

    /// Revoke every consent for a content item that was deleted or whose
    /// visibility was downgraded, cascading to their tokens.
    ///
    /// Pending requests for the item are denied. Consents that were already
    /// revoked have their tokens swept again, which is a no-op unless an
    /// earlier cascade was interrupted.
    pub async fn revoke_for_content_removed(
        &self,
        content: &ContentRef,
        reason: &str,
    ) -> Result<CascadeReport, SyndicationError> {
        let mut report = CascadeReport::default();

        for record in self.consents.list_for_content(content).await? {
            match record.status {
                ConsentStatus::Approved => {
                    if let Some(revocation) = self
                        .revoke_consent(&record.id, SYSTEM_ACTOR, Some(reason.to_string()))
                        .await?
                    {
                        report.consents_revoked += 1;
                        report.tokens_revoked += revocation.tokens_revoked.len();
                    }
                }
                ConsentStatus::Pending => {
                    let transition = ConsentTransition::Deny {
                        actor: SYSTEM_ACTOR.to_string(),
                        reason: Some(reason.to_string()),
                        at: self.clock.now(),
                    };
                    if let Some(denied) = self.consents.transition(&record.id, &transition).await? {
                        report.consents_denied += 1;
                        audit::record(
                            self.audit.as_ref(),
                            AuditEvent::for_consent(
                                AuditAction::ConsentDenied,
                                &denied,
                                None,
                                self.clock.now(),
                            )
                            .with_detail(reason),
                        )
                        .await;
                    }
                }
                ConsentStatus::Revoked => {
                    report.tokens_revoked += self.revoke_tokens(&record, reason, None).await?.len();
                }
                ConsentStatus::Denied => {}
            }
        }

        info!(
            content = %content,
            consents_revoked = report.consents_revoked,
            consents_denied = report.consents_denied,
            tokens_revoked = report.tokens_revoked,
            "Revoked syndication for removed content"
        );

        Ok(report)
    }

    /// Count what removing `content` would revoke, without writing anything.
    pub async fn preview_content_removal(
        &self,
        content: &ContentRef,
    ) -> Result<RemovalPreview, SyndicationError> {
        let mut preview = RemovalPreview::default();
        let mut sweepable = HashSet::new();

        for record in self.consents.list_for_content(content).await? {
            match record.status {
                ConsentStatus::Approved => {
                    preview.consents_to_revoke += 1;
                    sweepable.insert(record.id);
                }
                ConsentStatus::Pending => preview.consents_to_deny += 1,
                ConsentStatus::Revoked => {
                    sweepable.insert(record.id);
                }
                ConsentStatus::Denied => {}
            }
        }

        for token in self.tokens.list_for_content(content).await? {
            preview.total_requests += token.usage_count;
            if token.status == TokenStatus::Active && sweepable.contains(&token.consent_id) {
                preview.tokens_to_revoke += 1;
            }
        }

        Ok(preview)
    }

    /// Revoke a single embed token. Revoking a token that is no longer
    /// active is not an error.
    ///
    /// Returns whether this call changed the token.
    pub async fn revoke_token(
        &self,
        token_id: &TokenId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<bool, SyndicationError> {
        let token = self
            .tokens
            .get(token_id)
            .await?
            .ok_or(SyndicationError::TokenNotFound(*token_id))?;

        ensure_owner_or_elevated(
            self.content.as_ref(),
            actor,
            &token.content,
            Some(token.created_by.as_str()),
        )
        .await?;

        let now = self.clock.now();
        let reason = reason.unwrap_or_else(|| "revoked by owner".to_string());
        let revocation = Revocation {
            at: now,
            reason: reason.clone(),
            revoked_by: Some(actor.id.clone()),
        };

        let changed = self.tokens.revoke(token_id, &revocation).await?;
        if changed {
            info!(
                token_id = %token_id,
                consent_id = %token.consent_id,
                actor = %actor.id,
                "Revoked embed token"
            );
            audit::record(
                self.audit.as_ref(),
                AuditEvent::for_token(
                    AuditAction::TokenRevoked,
                    &token,
                    Some(actor.id.as_str()),
                    now,
                )
                .with_detail(reason),
            )
            .await;
        }

        Ok(changed)
    }

    /// Delete revoked and expired token rows that closed more than
    /// `older_than` ago. Consent records are never deleted.
    pub async fn purge_stale_tokens(&self, older_than: Duration) -> Result<usize, SyndicationError> {
        let cutoff = self.clock.now() - older_than;
        let purged = self.tokens.purge_closed_before(cutoff).await?;
        info!(purged, cutoff = %cutoff, "Purged stale embed tokens");
        Ok(purged)
    }

    /// Move an approved consent to `revoked` and cascade to its tokens in the
    /// same call.
    ///
    /// Returns `None` if the record was not approved at the moment of the
    /// conditional update.
    pub(crate) async fn revoke_consent(
        &self,
        consent_id: &ConsentId,
        actor: &str,
        reason: Option<String>,
    ) -> Result<Option<ConsentRevocation>, SyndicationError> {
        let transition = ConsentTransition::Revoke {
            actor: actor.to_string(),
            reason: reason.clone(),
            at: self.clock.now(),
        };

        let Some(record) = self.consents.transition(consent_id, &transition).await? else {
            return Ok(None);
        };

        let recorded_actor = (actor != SYSTEM_ACTOR).then_some(actor);
        let mut event = AuditEvent::for_consent(
            AuditAction::ConsentRevoked,
            &record,
            recorded_actor,
            self.clock.now(),
        );
        if let Some(reason) = &reason {
            event = event.with_detail(reason.clone());
        }
        audit::record(self.audit.as_ref(), event).await;

        let reason = reason.unwrap_or_else(|| "consent revoked".to_string());
        let tokens_revoked = self.revoke_tokens(&record, &reason, recorded_actor).await?;

        info!(
            consent_id = %record.id,
            content = %record.content,
            site = %record.site_slug,
            actor = %actor,
            tokens_revoked = tokens_revoked.len(),
            "Revoked syndication consent"
        );

        Ok(Some(ConsentRevocation {
            record,
            tokens_revoked,
        }))
    }

    async fn revoke_tokens(
        &self,
        record: &ConsentRecord,
        reason: &str,
        actor: Option<&str>,
    ) -> Result<Vec<TokenId>, SyndicationError> {
        let now = self.clock.now();
        let revocation = Revocation {
            at: now,
            reason: reason.to_string(),
            revoked_by: actor.map(str::to_string),
        };

        let revoked = self
            .tokens
            .revoke_active_for_consent(&record.id, &revocation)
            .await?;

        for token_id in &revoked {
            let event = AuditEvent {
                token_id: Some(*token_id),
                ..AuditEvent::for_consent(AuditAction::TokenRevoked, record, actor, now)
            };
            audit::record(self.audit.as_ref(), event.with_detail(reason)).await;
        }

        if !revoked.is_empty() {
            info!(
                consent_id = %record.id,
                tokens_revoked = revoked.len(),
                "Revoked embed tokens for consent"
            );
        }

        Ok(revoked)
    }
}
