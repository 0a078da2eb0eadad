use chrono::Duration;
use std::sync::Arc;
use syndication_config::SyndicationConfig;
use syndication_store::{
    AuditAction, AuditEvent, AuditLog, ConsentId, ConsentStore, ContentDirectory, EmbedToken,
    Revocation, SiteDirectory, TokenId, TokenStatus, TokenStore,
};
use syndication_token::{generate_token, mask_token, PlaintextToken};
use tracing::{info, warn};

use crate::actor::{ensure_owner_or_elevated, Actor};
use crate::audit;
use crate::clock::Clock;
use crate::error::SyndicationError;

/// A freshly issued token together with its secret.
///
/// This is the only time the plaintext exists outside the caller; the store
/// keeps the hash and a masked form. `Debug` prints the masked form only.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: EmbedToken,
    pub plaintext: PlaintextToken,
}

/// Mints embed tokens from approved consent records
#[derive(Clone)]
pub struct TokenIssuer {
    consents: Arc<dyn ConsentStore>,
    tokens: Arc<dyn TokenStore>,
    sites: Arc<dyn SiteDirectory>,
    content: Arc<dyn ContentDirectory>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
    config: Arc<SyndicationConfig>,
}

impl TokenIssuer {
    pub fn new(
        consents: Arc<dyn ConsentStore>,
        tokens: Arc<dyn TokenStore>,
        sites: Arc<dyn SiteDirectory>,
        content: Arc<dyn ContentDirectory>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
        config: Arc<SyndicationConfig>,
    ) -> Self {
        Self {
            consents,
            tokens,
            sites,
            content,
            audit,
            clock,
            config,
        }
    }

    /// Issue an embed token for an approved consent.
    ///
    /// The token expires `expiry_days` from now (the configured default when
    /// `None`), or when the consent itself expires if that is sooner. The
    /// site's current domain allow-list is copied into the token.
    ///
    /// # Arguments
    ///
    /// * `consent_id` - The approved consent to issue under
    /// * `expiry_days` - Requested lifetime, `1..=max_expiry_days`
    /// * `actor` - The content owner, or an elder, moderator or admin
    ///
    /// # Returns
    ///
    /// The stored token and the plaintext secret, which cannot be retrieved
    /// again
    pub async fn issue(
        &self,
        consent_id: &ConsentId,
        expiry_days: Option<u32>,
        actor: &Actor,
    ) -> Result<IssuedToken, SyndicationError> {
        let consent = self
            .consents
            .get(consent_id)
            .await?
            .ok_or(SyndicationError::ConsentNotFound(*consent_id))?;

        ensure_owner_or_elevated(
            self.content.as_ref(),
            actor,
            &consent.content,
            Some(consent.created_by.as_str()),
        )
        .await?;

        let now = self.clock.now();
        if !consent.is_in_force(now) {
            return Err(SyndicationError::ConsentNotApproved(*consent_id));
        }

        let days = expiry_days.unwrap_or(self.config.default_expiry_days);
        if days == 0 || days > self.config.max_expiry_days {
            return Err(SyndicationError::ExpiryOutOfRange {
                requested: days,
                max: self.config.max_expiry_days,
            });
        }

        let site = self
            .sites
            .site(&consent.site_slug)
            .await?
            .ok_or_else(|| SyndicationError::SiteNotFound(consent.site_slug.clone()))?;
        if !site.is_active() {
            return Err(SyndicationError::SiteInactive(site.slug));
        }

        let requested_expiry = now + Duration::days(i64::from(days));
        let expires_at = match consent.expires_at {
            Some(consent_expiry) => requested_expiry.min(consent_expiry),
            None => requested_expiry,
        };

        let (plaintext, token_hash) = generate_token();
        let token = EmbedToken {
            id: TokenId::new(),
            consent_id: consent.id,
            content: consent.content.clone(),
            site_slug: consent.site_slug.clone(),
            token_hash,
            masked: mask_token(
                plaintext.expose(),
                self.config.mask_prefix_len,
                self.config.mask_suffix_len,
            ),
            allowed_domains: site.allowed_domains,
            status: TokenStatus::Active,
            expires_at: Some(expires_at),
            usage_count: 0,
            last_used_at: None,
            last_used_domain: None,
            last_used_address: None,
            created_by: actor.id.clone(),
            created_at: now,
            revoked_by: None,
            revoked_at: None,
            revocation_reason: None,
            expired_at: None,
        };

        self.tokens.insert(token.clone()).await?;

        // A revoke that committed after the check above cascaded before this
        // token existed. Close the token here so it never outlives its consent.
        let still_in_force = self
            .consents
            .get(consent_id)
            .await?
            .is_some_and(|current| current.is_in_force(self.clock.now()));
        if !still_in_force {
            let revocation = Revocation {
                at: self.clock.now(),
                reason: "consent withdrawn during issuance".to_string(),
                revoked_by: None,
            };
            self.tokens.revoke(&token.id, &revocation).await?;
            warn!(
                token_id = %token.id,
                consent_id = %token.consent_id,
                "Consent withdrawn while issuing; embed token revoked"
            );
            return Err(SyndicationError::ConsentNotApproved(*consent_id));
        }

        info!(
            token_id = %token.id,
            consent_id = %token.consent_id,
            content = %token.content,
            site = %token.site_slug,
            masked = %token.masked,
            expires_at = %expires_at,
            actor = %actor.id,
            "Issued embed token"
        );
        audit::record(
            self.audit.as_ref(),
            AuditEvent::for_token(
                AuditAction::TokenIssued,
                &token,
                Some(actor.id.as_str()),
                now,
            )
            .with_detail(format!("expires {}", expires_at.to_rfc3339())),
        )
        .await;

        Ok(IssuedToken { token, plaintext })
    }
}
