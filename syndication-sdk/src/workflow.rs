use chrono::{DateTime, Utc};
use std::sync::Arc;
use syndication_store::{
    AuditAction, AuditEvent, AuditLog, ConsentId, ConsentRecord, ConsentStatus, ConsentStore,
    ConsentTransition, ContentDirectory, ContentRef, Permissions, SiteDirectory, StoreError,
};
use tracing::info;

use crate::actor::{ensure_owner_or_elevated, Actor};
use crate::audit;
use crate::cascade::{ConsentRevocation, RevocationCascade};
use crate::clock::Clock;
use crate::error::SyndicationError;

/// A request to syndicate one content item to one site
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsentRequest {
    pub content: ContentRef,
    pub site_slug: String,
    pub permissions: Permissions,
    /// Ask for elder sign-off even when the content's classification does
    /// not demand it
    pub requires_elder_approval: bool,
    pub cultural_notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ConsentRequest {
    pub fn new(content: ContentRef, site_slug: impl Into<String>) -> Self {
        Self {
            content,
            site_slug: site_slug.into(),
            permissions: Permissions::embed_only(),
            requires_elder_approval: false,
            cultural_notes: None,
            expires_at: None,
        }
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn requires_elder_approval(mut self, required: bool) -> Self {
        self.requires_elder_approval = required;
        self
    }

    pub fn cultural_notes(mut self, notes: impl Into<String>) -> Self {
        self.cultural_notes = Some(notes.into());
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// State machine over consent records.
///
/// ```text
/// create ──gated──▶ pending ──approve──▶ approved ──revoke──▶ revoked
///    │                 │
///    └──ungated──▶ approved            └──deny──▶ denied
/// ```
///
/// Every transition is a conditional update in the [`ConsentStore`]; a
/// transition requested from the wrong status fails with
/// [`SyndicationError::InvalidState`].
#[derive(Clone)]
pub struct ConsentWorkflow {
    consents: Arc<dyn ConsentStore>,
    sites: Arc<dyn SiteDirectory>,
    content: Arc<dyn ContentDirectory>,
    cascade: RevocationCascade,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl ConsentWorkflow {
    pub fn new(
        consents: Arc<dyn ConsentStore>,
        sites: Arc<dyn SiteDirectory>,
        content: Arc<dyn ContentDirectory>,
        cascade: RevocationCascade,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            consents,
            sites,
            content,
            cascade,
            audit,
            clock,
        }
    }

    /// Create a consent record.
    ///
    /// The record starts `pending` when elder approval is required, either
    /// by the request or by the content's cultural classification.
    /// Otherwise it is approved immediately with the creator as approver.
    ///
    /// # Arguments
    ///
    /// * `request` - Content, site, permissions and optional expiry
    /// * `actor` - The content owner, or an elder, moderator or admin
    ///
    /// # Returns
    ///
    /// The stored record
    pub async fn create(
        &self,
        request: ConsentRequest,
        actor: &Actor,
    ) -> Result<ConsentRecord, SyndicationError> {
        let profile = self
            .content
            .profile(&request.content)
            .await?
            .ok_or_else(|| SyndicationError::ContentNotFound(request.content.clone()))?;

        if profile.owner_id != actor.id && !actor.is_elevated() {
            return Err(SyndicationError::Forbidden(format!(
                "{} cannot syndicate {} owned by someone else",
                actor.id, request.content
            )));
        }

        if !profile.is_syndicatable() {
            return Err(SyndicationError::CulturallyRestricted(request.content));
        }

        if self.sites.site(&request.site_slug).await?.is_none() {
            return Err(SyndicationError::SiteNotFound(request.site_slug));
        }

        let now = self.clock.now();
        let gated = request.requires_elder_approval || profile.requires_elder_approval();
        let (status, approved_by, approved_at) = if gated {
            (ConsentStatus::Pending, None, None)
        } else {
            (ConsentStatus::Approved, Some(actor.id.clone()), Some(now))
        };

        let record = ConsentRecord {
            id: ConsentId::new(),
            content: request.content,
            site_slug: request.site_slug,
            status,
            permissions: request.permissions,
            requires_elder_approval: gated,
            cultural_notes: request.cultural_notes,
            expires_at: request.expires_at,
            created_by: actor.id.clone(),
            created_at: now,
            approved_by,
            approved_at,
            denied_by: None,
            denied_at: None,
            revoked_by: None,
            revoked_at: None,
            status_reason: None,
        };

        match self.consents.insert(record.clone()).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(SyndicationError::DuplicateConsent {
                    content: record.content,
                    site_slug: record.site_slug,
                })
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            consent_id = %record.id,
            content = %record.content,
            site = %record.site_slug,
            status = %record.status,
            requires_elder_approval = gated,
            actor = %actor.id,
            "Created syndication consent"
        );

        let mut event = AuditEvent::for_consent(
            AuditAction::ConsentCreated,
            &record,
            Some(actor.id.as_str()),
            now,
        );
        if !gated {
            event = event.with_detail("approved on creation");
        }
        audit::record(self.audit.as_ref(), event).await;

        Ok(record)
    }

    /// Approve a pending consent. Only elders and admins may approve.
    ///
    /// Approval does not issue a token; that is a separate call so the
    /// approver can review the permissions before any token exists.
    pub async fn approve(
        &self,
        consent_id: &ConsentId,
        approver: &Actor,
    ) -> Result<ConsentRecord, SyndicationError> {
        let record = self.load(consent_id).await?;

        if !approver.can_approve() {
            return Err(SyndicationError::Forbidden(format!(
                "{} cannot approve syndication consent; an elder or admin is required",
                approver.id
            )));
        }

        let transition = ConsentTransition::Approve {
            approver: approver.id.clone(),
            at: self.clock.now(),
        };
        let approved = self.apply(&record, &transition, "approve").await?;

        info!(
            consent_id = %approved.id,
            content = %approved.content,
            site = %approved.site_slug,
            approver = %approver.id,
            "Approved syndication consent"
        );
        audit::record(
            self.audit.as_ref(),
            AuditEvent::for_consent(
                AuditAction::ConsentApproved,
                &approved,
                Some(approver.id.as_str()),
                self.clock.now(),
            ),
        )
        .await;

        Ok(approved)
    }

    /// Deny a pending consent. Terminal.
    pub async fn deny(
        &self,
        consent_id: &ConsentId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<ConsentRecord, SyndicationError> {
        let record = self.load(consent_id).await?;

        if !actor.is_elevated() {
            return Err(SyndicationError::Forbidden(format!(
                "{} cannot deny syndication consent; an elder, moderator or admin is required",
                actor.id
            )));
        }

        let transition = ConsentTransition::Deny {
            actor: actor.id.clone(),
            reason: reason.clone(),
            at: self.clock.now(),
        };
        let denied = self.apply(&record, &transition, "deny").await?;

        info!(
            consent_id = %denied.id,
            content = %denied.content,
            site = %denied.site_slug,
            actor = %actor.id,
            "Denied syndication consent"
        );
        let mut event = AuditEvent::for_consent(
            AuditAction::ConsentDenied,
            &denied,
            Some(actor.id.as_str()),
            self.clock.now(),
        );
        if let Some(reason) = reason {
            event = event.with_detail(reason);
        }
        audit::record(self.audit.as_ref(), event).await;

        Ok(denied)
    }

    /// Revoke an approved consent and every token issued under it.
    ///
    /// The token cascade completes before this returns, so no validation
    /// starting afterwards can accept one of those tokens.
    pub async fn revoke(
        &self,
        consent_id: &ConsentId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<ConsentRevocation, SyndicationError> {
        let record = self.load(consent_id).await?;

        ensure_owner_or_elevated(
            self.content.as_ref(),
            actor,
            &record.content,
            Some(record.created_by.as_str()),
        )
        .await?;

        if record.status != ConsentStatus::Approved {
            return Err(invalid_state(&record, "revoke"));
        }

        match self
            .cascade
            .revoke_consent(consent_id, &actor.id, reason)
            .await?
        {
            Some(revocation) => Ok(revocation),
            None => Err(self.stale_state(consent_id, "revoke").await),
        }
    }

    /// Replace the permission flags of a pending or approved consent.
    pub async fn update_permissions(
        &self,
        consent_id: &ConsentId,
        permissions: Permissions,
        actor: &Actor,
    ) -> Result<ConsentRecord, SyndicationError> {
        let record = self.load(consent_id).await?;

        ensure_owner_or_elevated(
            self.content.as_ref(),
            actor,
            &record.content,
            Some(record.created_by.as_str()),
        )
        .await?;

        if !record.status.is_active() {
            return Err(invalid_state(&record, "update permissions of"));
        }

        let updated = match self
            .consents
            .update_permissions(consent_id, permissions)
            .await?
        {
            Some(updated) => updated,
            None => return Err(self.stale_state(consent_id, "update permissions of").await),
        };

        info!(
            consent_id = %updated.id,
            actor = %actor.id,
            full_resolution = permissions.allow_full_resolution,
            download = permissions.allow_download,
            embedding = permissions.allow_embedding,
            hotlinking = permissions.allow_hotlinking,
            "Updated syndication permissions"
        );
        audit::record(
            self.audit.as_ref(),
            AuditEvent::for_consent(
                AuditAction::PermissionsUpdated,
                &updated,
                Some(actor.id.as_str()),
                self.clock.now(),
            ),
        )
        .await;

        Ok(updated)
    }

    pub async fn get(&self, consent_id: &ConsentId) -> Result<ConsentRecord, SyndicationError> {
        self.load(consent_id).await
    }

    /// Every consent ever recorded for a content item, oldest first
    pub async fn list_for_content(
        &self,
        content: &ContentRef,
    ) -> Result<Vec<ConsentRecord>, SyndicationError> {
        Ok(self.consents.list_for_content(content).await?)
    }

    /// Every consent ever recorded for a site, oldest first
    pub async fn list_for_site(
        &self,
        site_slug: &str,
    ) -> Result<Vec<ConsentRecord>, SyndicationError> {
        Ok(self.consents.list_for_site(site_slug).await?)
    }

    async fn load(&self, consent_id: &ConsentId) -> Result<ConsentRecord, SyndicationError> {
        self.consents
            .get(consent_id)
            .await?
            .ok_or(SyndicationError::ConsentNotFound(*consent_id))
    }

    async fn apply(
        &self,
        record: &ConsentRecord,
        transition: &ConsentTransition,
        operation: &'static str,
    ) -> Result<ConsentRecord, SyndicationError> {
        if record.status != transition.from_status() {
            return Err(invalid_state(record, operation));
        }

        match self.consents.transition(&record.id, transition).await? {
            Some(updated) => Ok(updated),
            None => Err(self.stale_state(&record.id, operation).await),
        }
    }

    /// Error for a conditional update that lost a race: report the status
    /// the record moved to.
    async fn stale_state(
        &self,
        consent_id: &ConsentId,
        operation: &'static str,
    ) -> SyndicationError {
        match self.load(consent_id).await {
            Ok(current) => invalid_state(&current, operation),
            Err(e) => e,
        }
    }
}

fn invalid_state(record: &ConsentRecord, operation: &'static str) -> SyndicationError {
    SyndicationError::InvalidState {
        id: record.id,
        status: record.status,
        operation,
    }
}
