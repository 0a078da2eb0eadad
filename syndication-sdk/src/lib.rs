//! # Syndication SDK
//!
//! Consent-gated, revocable embed tokens for storyteller content.
//!
//! A storyteller's gallery or story can be shown on an external site only
//! under a consent record. Culturally sensitive items need an elder's
//! approval before the consent becomes active. Once approved, the owner
//! issues embed tokens, and the external site presents one on every embed
//! request. Revoking the consent revokes every token issued under it before
//! the call returns.
//!
//! This crate combines functionality from:
//! - `syndication-token`: Token generation, hashing, masking and domain matching
//! - `syndication-config`: Configuration management
//! - `syndication-store`: Records and the storage traits they persist through
//!
//! ## Components
//!
//! - [`ConsentWorkflow`]: create, approve, deny, revoke and re-permission consents
//! - [`TokenIssuer`]: mint tokens from approved consents
//! - [`TokenValidator`]: accept or reject presented tokens, fail closed
//! - [`RevocationCascade`]: propagate revocation to tokens
//! - [`UsageReporter`]: usage counters and masked token listings
//!
//! [`Syndication`] wires them together over one set of stores.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use syndication_sdk::{
//!     Actor, ConsentRequest, ContentProfile, ContentRef, MemoryDirectory, RequestContext, Site,
//!     Syndication,
//! };
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let directory = Arc::new(MemoryDirectory::new());
//! directory.put_site(Site::new("partner", "Partner News", &["partner.net"])).await;
//! let story = ContentRef::story("story-1");
//! directory.put_content(ContentProfile::new(story.clone(), "teller-1")).await;
//!
//! let syndication = Syndication::builder()
//!     .in_memory()
//!     .directory(directory)
//!     .build()
//!     .unwrap();
//!
//! let owner = Actor::storyteller("teller-1");
//! let consent = syndication
//!     .create_consent(ConsentRequest::new(story, "partner"), &owner)
//!     .await
//!     .unwrap();
//! let issued = syndication.issue(&consent.id, None, &owner).await.unwrap();
//!
//! let context = RequestContext::new().domain("https://news.partner.net");
//! let validation = syndication.validate(issued.plaintext.expose(), &context).await;
//! assert!(validation.is_valid());
//! # });
//! ```

use chrono::Duration;
use std::sync::Arc;

mod actor;
mod audit;
mod cascade;
mod clock;
mod error;
mod issuer;
mod reporter;
mod validator;
mod workflow;

pub use actor::{Actor, Role, SYSTEM_ACTOR};
pub use audit::TracingAuditLog;
pub use cascade::{CascadeReport, ConsentRevocation, RemovalPreview, RevocationCascade};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorCode, SdkError, SyndicationError};
pub use issuer::{IssuedToken, TokenIssuer};
pub use reporter::{TokenSummary, UsageReporter, UsageStats};
pub use validator::{
    EmbedGrant, RejectReason, RequestContext, TokenValidator, Validation, ACCESS_DENIED,
};
pub use workflow::{ConsentRequest, ConsentWorkflow};

pub use syndication_config::{
    try_load_default_config, ConfigError, SyndicationConfig, SyndicationConfigBuilder,
    MAX_ALLOWED_EXPIRY_DAYS,
};
pub use syndication_store::{
    AuditAction, AuditEvent, AuditLog, ConsentId, ConsentRecord, ConsentStatus, ConsentStore,
    ConsentTransition, ContentDirectory, ContentProfile, ContentRef, CulturalSensitivity,
    EmbedToken, MemoryAuditLog, MemoryConsentStore, MemoryDirectory, MemoryTokenStore,
    Permissions, Revocation, Site, SiteDirectory, SiteStatus, StoreError, TokenId, TokenStatus,
    TokenStore, UsageUpdate,
};
pub use syndication_token::{
    domain_allowed, generate_token, hash_token, mask_token, normalize_domain, PlaintextToken,
    TokenHash,
};

/// The syndication service: every component over one set of stores
///
/// This struct is the entry point the HTTP boundary talks to. Authority
/// checks take the [`Actor`] resolved by that boundary.
///
/// # Runtime
///
/// [`Syndication::validate`] bounds every storage call with
/// `tokio::time::timeout`, so it must run on a Tokio runtime with the time
/// driver enabled (`enable_time()` or `enable_all()`; `#[tokio::main]` and
/// `#[tokio::test]` already do this). On a runtime without timers it panics.
#[derive(Clone)]
pub struct Syndication {
    workflow: ConsentWorkflow,
    issuer: TokenIssuer,
    validator: TokenValidator,
    cascade: RevocationCascade,
    reporter: UsageReporter,
    config: Arc<SyndicationConfig>,
}

impl Syndication {
    /// Create a builder for a syndication service
    pub fn builder() -> SyndicationBuilder {
        SyndicationBuilder::new()
    }

    /// Create a consent record for a (content, site) pair
    pub async fn create_consent(
        &self,
        request: ConsentRequest,
        actor: &Actor,
    ) -> Result<ConsentRecord, SyndicationError> {
        self.workflow.create(request, actor).await
    }

    /// Approve a pending consent (elder or admin)
    pub async fn approve(
        &self,
        consent_id: &ConsentId,
        approver: &Actor,
    ) -> Result<ConsentRecord, SyndicationError> {
        self.workflow.approve(consent_id, approver).await
    }

    /// Deny a pending consent
    pub async fn deny(
        &self,
        consent_id: &ConsentId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<ConsentRecord, SyndicationError> {
        self.workflow.deny(consent_id, actor, reason).await
    }

    /// Revoke an approved consent and all of its tokens
    pub async fn revoke(
        &self,
        consent_id: &ConsentId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<ConsentRevocation, SyndicationError> {
        self.workflow.revoke(consent_id, actor, reason).await
    }

    /// Change the permission flags of a pending or approved consent
    pub async fn update_permissions(
        &self,
        consent_id: &ConsentId,
        permissions: Permissions,
        actor: &Actor,
    ) -> Result<ConsentRecord, SyndicationError> {
        self.workflow
            .update_permissions(consent_id, permissions, actor)
            .await
    }

    /// Look up a consent record
    pub async fn consent(&self, consent_id: &ConsentId) -> Result<ConsentRecord, SyndicationError> {
        self.workflow.get(consent_id).await
    }

    /// All consents recorded for a content item
    pub async fn consents_for_content(
        &self,
        content: &ContentRef,
    ) -> Result<Vec<ConsentRecord>, SyndicationError> {
        self.workflow.list_for_content(content).await
    }

    /// All consents recorded for a site
    pub async fn consents_for_site(
        &self,
        site_slug: &str,
    ) -> Result<Vec<ConsentRecord>, SyndicationError> {
        self.workflow.list_for_site(site_slug).await
    }

    /// Issue an embed token; the plaintext is returned only here
    pub async fn issue(
        &self,
        consent_id: &ConsentId,
        expiry_days: Option<u32>,
        actor: &Actor,
    ) -> Result<IssuedToken, SyndicationError> {
        self.issuer.issue(consent_id, expiry_days, actor).await
    }

    /// Validate a presented token
    pub async fn validate(&self, token: &str, context: &RequestContext) -> Validation {
        self.validator.validate(token, context).await
    }

    /// Revoke a single token
    pub async fn revoke_token(
        &self,
        token_id: &TokenId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<bool, SyndicationError> {
        self.cascade.revoke_token(token_id, actor, reason).await
    }

    /// Revoke every active token of a consent
    pub async fn revoke_for_consent(
        &self,
        consent_id: &ConsentId,
        reason: &str,
    ) -> Result<Vec<TokenId>, SyndicationError> {
        self.cascade.revoke_for_consent(consent_id, reason).await
    }

    /// Withdraw all syndication of a deleted or downgraded content item
    pub async fn revoke_for_content_removed(
        &self,
        content: &ContentRef,
        reason: &str,
    ) -> Result<CascadeReport, SyndicationError> {
        self.cascade.revoke_for_content_removed(content, reason).await
    }

    /// Counts of what [`Syndication::revoke_for_content_removed`] would
    /// change. Read-only.
    pub async fn preview_content_removal(
        &self,
        content: &ContentRef,
    ) -> Result<RemovalPreview, SyndicationError> {
        self.cascade.preview_content_removal(content).await
    }

    /// Usage counters for a content item
    pub async fn stats_for_content(
        &self,
        content: &ContentRef,
    ) -> Result<UsageStats, SyndicationError> {
        self.reporter.stats_for_content(content).await
    }

    /// Usage counters for a consent
    pub async fn stats_for_consent(
        &self,
        consent_id: &ConsentId,
    ) -> Result<UsageStats, SyndicationError> {
        self.reporter.stats_for_consent(consent_id).await
    }

    /// Masked token listings for a content item
    pub async fn tokens_for_content(
        &self,
        content: &ContentRef,
    ) -> Result<Vec<TokenSummary>, SyndicationError> {
        self.reporter.tokens_for_content(content).await
    }

    /// Masked token listings for a consent
    pub async fn tokens_for_consent(
        &self,
        consent_id: &ConsentId,
    ) -> Result<Vec<TokenSummary>, SyndicationError> {
        self.reporter.tokens_for_consent(consent_id).await
    }

    /// Delete revoked and expired tokens closed more than `older_than` ago
    pub async fn purge_stale_tokens(&self, older_than: Duration) -> Result<usize, SyndicationError> {
        self.cascade.purge_stale_tokens(older_than).await
    }

    pub fn workflow(&self) -> &ConsentWorkflow {
        &self.workflow
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    pub fn cascade(&self) -> &RevocationCascade {
        &self.cascade
    }

    pub fn reporter(&self) -> &UsageReporter {
        &self.reporter
    }

    /// Get the configuration used by this service
    pub fn config(&self) -> &SyndicationConfig {
        &self.config
    }
}

/// Builder for [`Syndication`] services
///
/// Consent and token stores, the site directory and the content directory
/// are required. The clock defaults to [`SystemClock`] and the audit sink to
/// [`TracingAuditLog`].
pub struct SyndicationBuilder {
    config_builder: SyndicationConfigBuilder,
    consents: Option<Arc<dyn ConsentStore>>,
    tokens: Option<Arc<dyn TokenStore>>,
    sites: Option<Arc<dyn SiteDirectory>>,
    content: Option<Arc<dyn ContentDirectory>>,
    audit: Option<Arc<dyn AuditLog>>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for SyndicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SyndicationBuilder {
    /// Create a new syndication service builder
    pub fn new() -> Self {
        Self {
            config_builder: SyndicationConfig::builder(),
            consents: None,
            tokens: None,
            sites: None,
            content: None,
            audit: None,
            clock: None,
        }
    }

    /// Start from an existing configuration
    pub fn config(mut self, config: &SyndicationConfig) -> Self {
        self.config_builder = SyndicationConfigBuilder::from_config(config);
        self
    }

    /// Set the token lifetime used when an issue request names none
    pub fn default_expiry_days(mut self, days: u32) -> Self {
        self.config_builder = self.config_builder.default_expiry_days(days);
        self
    }

    /// Set the longest token lifetime an issue request may ask for
    pub fn max_expiry_days(mut self, days: u32) -> Self {
        self.config_builder = self.config_builder.max_expiry_days(days);
        self
    }

    /// Set the per-call storage deadline on the validation path
    pub fn storage_timeout_ms(mut self, millis: u64) -> Self {
        self.config_builder = self.config_builder.storage_timeout_ms(millis);
        self
    }

    pub fn consent_store(mut self, store: Arc<dyn ConsentStore>) -> Self {
        self.consents = Some(store);
        self
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.tokens = Some(store);
        self
    }

    /// Use fresh in-memory consent and token stores
    pub fn in_memory(self) -> Self {
        self.consent_store(Arc::new(MemoryConsentStore::new()))
            .token_store(Arc::new(MemoryTokenStore::new()))
    }

    pub fn site_directory(mut self, sites: Arc<dyn SiteDirectory>) -> Self {
        self.sites = Some(sites);
        self
    }

    pub fn content_directory(mut self, content: Arc<dyn ContentDirectory>) -> Self {
        self.content = Some(content);
        self
    }

    /// Use one backend as both the site and the content directory
    pub fn directory<D>(self, directory: Arc<D>) -> Self
    where
        D: SiteDirectory + ContentDirectory + 'static,
    {
        let sites: Arc<dyn SiteDirectory> = directory.clone();
        let content: Arc<dyn ContentDirectory> = directory;
        self.site_directory(sites).content_directory(content)
    }

    pub fn audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build a syndication service
    pub fn build(self) -> Result<Syndication, SdkError> {
        let config = Arc::new(self.config_builder.build()?);
        let consents = self
            .consents
            .ok_or(SdkError::MissingComponent("consent store"))?;
        let tokens = self.tokens.ok_or(SdkError::MissingComponent("token store"))?;
        let sites = self
            .sites
            .ok_or(SdkError::MissingComponent("site directory"))?;
        let content = self
            .content
            .ok_or(SdkError::MissingComponent("content directory"))?;
        let audit = self.audit.unwrap_or_else(|| Arc::new(TracingAuditLog));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let cascade = RevocationCascade::new(
            consents.clone(),
            tokens.clone(),
            content.clone(),
            audit.clone(),
            clock.clone(),
        );
        let workflow = ConsentWorkflow::new(
            consents.clone(),
            sites.clone(),
            content.clone(),
            cascade.clone(),
            audit.clone(),
            clock.clone(),
        );
        let issuer = TokenIssuer::new(
            consents.clone(),
            tokens.clone(),
            sites,
            content,
            audit.clone(),
            clock.clone(),
            config.clone(),
        );
        let validator = TokenValidator::new(consents, tokens.clone(), audit, clock.clone(), &config);
        let reporter = UsageReporter::new(tokens, clock);

        Ok(Syndication {
            workflow,
            issuer,
            validator,
            cascade,
            reporter,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    struct Harness {
        syndication: Syndication,
        directory: Arc<MemoryDirectory>,
        audit: Arc<MemoryAuditLog>,
        clock: Arc<ManualClock>,
        story: ContentRef,
        owner: Actor,
    }

    async fn harness() -> Harness {
        let directory = Arc::new(MemoryDirectory::new());
        directory
            .put_site(Site::new("partner", "Partner News", &["example.org"]))
            .await;
        let story = ContentRef::story("story-1");
        directory
            .put_content(ContentProfile::new(story.clone(), "teller-1"))
            .await;

        let audit = Arc::new(MemoryAuditLog::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap(),
        ));
        let syndication = Syndication::builder()
            .in_memory()
            .directory(directory.clone())
            .audit_log(audit.clone())
            .clock(clock.clone())
            .build()
            .unwrap();

        Harness {
            syndication,
            directory,
            audit,
            clock,
            story,
            owner: Actor::storyteller("teller-1"),
        }
    }

    #[tokio::test]
    async fn test_build_requires_stores() {
        let err = Syndication::builder().build().err().unwrap();
        assert!(matches!(err, SdkError::MissingComponent("consent store")));

        let err = Syndication::builder()
            .in_memory()
            .directory(Arc::new(MemoryDirectory::new()))
            .max_expiry_days(400)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[tokio::test]
    async fn test_ungated_consent_is_approved_by_creator() {
        let h = harness().await;
        let record = h
            .syndication
            .create_consent(ConsentRequest::new(h.story.clone(), "partner"), &h.owner)
            .await
            .unwrap();

        assert_eq!(record.status, ConsentStatus::Approved);
        assert!(!record.requires_elder_approval);
        assert_eq!(record.approved_by.as_deref(), Some("teller-1"));

        let err = h
            .syndication
            .create_consent(ConsentRequest::new(h.story.clone(), "partner"), &h.owner)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateConsent);
    }

    #[tokio::test]
    async fn test_classification_gates_and_restricts() {
        let h = harness().await;
        let high = ContentRef::gallery("g-high");
        let sacred = ContentRef::gallery("g-sacred");
        h.directory
            .put_content(
                ContentProfile::new(high.clone(), "teller-1")
                    .with_sensitivity(CulturalSensitivity::High),
            )
            .await;
        h.directory
            .put_content(
                ContentProfile::new(sacred.clone(), "teller-1")
                    .with_sensitivity(CulturalSensitivity::Sacred),
            )
            .await;

        let pending = h
            .syndication
            .create_consent(ConsentRequest::new(high, "partner"), &h.owner)
            .await
            .unwrap();
        assert_eq!(pending.status, ConsentStatus::Pending);
        assert!(pending.requires_elder_approval);
        assert!(pending.approved_by.is_none());

        let err = h
            .syndication
            .create_consent(ConsentRequest::new(sacred, "partner"), &Actor::admin("a-1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CulturallyRestricted);
    }

    #[tokio::test]
    async fn test_authority_checks() {
        let h = harness().await;
        let stranger = Actor::storyteller("someone-else");

        let err = h
            .syndication
            .create_consent(ConsentRequest::new(h.story.clone(), "partner"), &stranger)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let record = h
            .syndication
            .create_consent(
                ConsentRequest::new(h.story.clone(), "partner").requires_elder_approval(true),
                &h.owner,
            )
            .await
            .unwrap();

        // Moderators may deny but not approve
        let moderator = Actor::moderator("mod-1");
        let err = h
            .syndication
            .approve(&record.id, &moderator)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
        let err = h
            .syndication
            .deny(&record.id, &h.owner, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let approved = h
            .syndication
            .approve(&record.id, &Actor::elder("elder-1"))
            .await
            .unwrap();
        assert_eq!(approved.approved_by.as_deref(), Some("elder-1"));

        let err = h
            .syndication
            .revoke(&record.id, &stranger, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_transitions_from_wrong_status() {
        let h = harness().await;
        let record = h
            .syndication
            .create_consent(
                ConsentRequest::new(h.story.clone(), "partner").requires_elder_approval(true),
                &h.owner,
            )
            .await
            .unwrap();
        let elder = Actor::elder("elder-1");

        let err = h
            .syndication
            .revoke(&record.id, &h.owner, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);

        h.syndication
            .deny(&record.id, &elder, Some("not now".to_string()))
            .await
            .unwrap();
        let err = h.syndication.approve(&record.id, &elder).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
        let err = h
            .syndication
            .update_permissions(&record.id, Permissions::default(), &h.owner)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);

        let err = h
            .syndication
            .approve(&ConsentId::new(), &elder)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_issue_preconditions() {
        let h = harness().await;
        let pending = h
            .syndication
            .create_consent(
                ConsentRequest::new(h.story.clone(), "partner").requires_elder_approval(true),
                &h.owner,
            )
            .await
            .unwrap();

        let err = h
            .syndication
            .issue(&pending.id, None, &h.owner)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConsentNotApproved);

        h.syndication
            .approve(&pending.id, &Actor::elder("elder-1"))
            .await
            .unwrap();

        for days in [0, 366] {
            let err = h
                .syndication
                .issue(&pending.id, Some(days), &h.owner)
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::ExpiryOutOfRange);
        }

        h.directory
            .set_site_status("partner", SiteStatus::Inactive)
            .await;
        let err = h
            .syndication
            .issue(&pending.id, None, &h.owner)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SiteInactive);
    }

    #[tokio::test]
    async fn test_issued_token_is_stored_hashed_and_masked() {
        let h = harness().await;
        let record = h
            .syndication
            .create_consent(ConsentRequest::new(h.story.clone(), "partner"), &h.owner)
            .await
            .unwrap();
        let issued = h.syndication.issue(&record.id, None, &h.owner).await.unwrap();

        let secret = issued.plaintext.expose();
        assert_eq!(issued.token.token_hash, hash_token(secret));
        assert_ne!(issued.token.token_hash.as_str(), secret);
        assert!(issued.token.masked.starts_with(&secret[..8]));
        assert!(!issued.token.masked.contains(secret));
        assert_eq!(issued.token.status, TokenStatus::Active);
        assert_eq!(issued.token.usage_count, 0);
        assert_eq!(issued.token.allowed_domains, vec!["example.org".to_string()]);
        assert_eq!(
            issued.token.expires_at,
            Some(h.clock.now() + Duration::days(30))
        );

        let summaries = h.syndication.tokens_for_consent(&record.id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].masked, issued.token.masked);
    }

    #[tokio::test]
    async fn test_consent_expiry_bounds_token_expiry() {
        let h = harness().await;
        let consent_expiry = h.clock.now() + Duration::days(3);
        let record = h
            .syndication
            .create_consent(
                ConsentRequest::new(h.story.clone(), "partner").expires_at(consent_expiry),
                &h.owner,
            )
            .await
            .unwrap();

        let issued = h
            .syndication
            .issue(&record.id, Some(30), &h.owner)
            .await
            .unwrap();
        assert_eq!(issued.token.expires_at, Some(consent_expiry));

        h.clock.advance(Duration::days(4));
        let err = h
            .syndication
            .issue(&record.id, None, &h.owner)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConsentNotApproved);

        let validation = h
            .syndication
            .validate(issued.plaintext.expose(), &RequestContext::new())
            .await;
        assert_eq!(validation.reject_reason(), Some(RejectReason::Expired));
    }

    #[tokio::test]
    async fn test_update_permissions_flows_into_validation() {
        let h = harness().await;
        let record = h
            .syndication
            .create_consent(ConsentRequest::new(h.story.clone(), "partner"), &h.owner)
            .await
            .unwrap();
        let issued = h.syndication.issue(&record.id, None, &h.owner).await.unwrap();

        let permissions = Permissions {
            allow_full_resolution: true,
            allow_download: true,
            allow_embedding: true,
            allow_hotlinking: false,
        };
        h.syndication
            .update_permissions(&record.id, permissions, &h.owner)
            .await
            .unwrap();

        let validation = h
            .syndication
            .validate(issued.plaintext.expose(), &RequestContext::new())
            .await;
        assert_eq!(validation.grant().unwrap().permissions, permissions);
    }

    #[tokio::test]
    async fn test_revoke_token_is_idempotent() {
        let h = harness().await;
        let record = h
            .syndication
            .create_consent(ConsentRequest::new(h.story.clone(), "partner"), &h.owner)
            .await
            .unwrap();
        let keep = h.syndication.issue(&record.id, None, &h.owner).await.unwrap();
        let revoked = h.syndication.issue(&record.id, None, &h.owner).await.unwrap();

        assert!(h
            .syndication
            .revoke_token(&revoked.token.id, &h.owner, None)
            .await
            .unwrap());
        assert!(!h
            .syndication
            .revoke_token(&revoked.token.id, &h.owner, None)
            .await
            .unwrap());

        let ctx = RequestContext::new();
        assert_eq!(
            h.syndication
                .validate(revoked.plaintext.expose(), &ctx)
                .await
                .reject_reason(),
            Some(RejectReason::Revoked)
        );
        assert!(h
            .syndication
            .validate(keep.plaintext.expose(), &ctx)
            .await
            .is_valid());
    }

    #[tokio::test]
    async fn test_audit_trail_records_lifecycle() {
        let h = harness().await;
        let record = h
            .syndication
            .create_consent(ConsentRequest::new(h.story.clone(), "partner"), &h.owner)
            .await
            .unwrap();
        h.syndication.issue(&record.id, None, &h.owner).await.unwrap();
        h.syndication
            .revoke(&record.id, &h.owner, Some("moved on".to_string()))
            .await
            .unwrap();

        let actions: Vec<AuditAction> = h.audit.events().await.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::ConsentCreated,
                AuditAction::TokenIssued,
                AuditAction::ConsentRevoked,
                AuditAction::TokenRevoked,
            ]
        );
    }

    #[test]
    fn test_reject_reason_public_message_is_uniform() {
        let reasons = [
            RejectReason::NotFound,
            RejectReason::Revoked,
            RejectReason::Expired,
            RejectReason::ConsentWithdrawn,
            RejectReason::DomainNotAllowed,
            RejectReason::StorageUnavailable,
        ];
        for reason in reasons {
            assert_eq!(reason.public_message(), ACCESS_DENIED);
            assert!(reason.to_string().starts_with(reason.as_str()));
        }
    }

    #[test]
    fn test_error_codes() {
        let err = SyndicationError::SiteInactive("partner".to_string());
        assert_eq!(err.code().as_str(), "SITE_INACTIVE");
        let err = SyndicationError::from(StoreError::Timeout);
        assert_eq!(err.code(), ErrorCode::StorageUnavailable);
        assert_eq!(
            serde_json::to_string(&ErrorCode::ConsentNotApproved).unwrap(),
            "\"CONSENT_NOT_APPROVED\""
        );
    }

    #[test]
    fn test_validate_on_runtime_with_only_timers_enabled() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        runtime.block_on(async {
            let h = harness().await;
            let consent = h
                .syndication
                .create_consent(ConsentRequest::new(h.story.clone(), "partner"), &h.owner)
                .await
                .unwrap();
            let issued = h.syndication.issue(&consent.id, None, &h.owner).await.unwrap();

            let validation = h
                .syndication
                .validate(issued.plaintext.expose(), &RequestContext::new())
                .await;
            assert!(validation.is_valid());
        });
    }
}
