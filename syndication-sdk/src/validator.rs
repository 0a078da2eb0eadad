use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use syndication_config::SyndicationConfig;
use syndication_store::{
    AuditAction, AuditEvent, AuditLog, ConsentId, ConsentStatus, ConsentStore, ContentRef,
    EmbedToken, Permissions, StoreError, TokenId, TokenStatus, TokenStore, UsageUpdate,
};
use syndication_token::{domain_allowed, hash_token, normalize_domain};
use tracing::{debug, warn};

use crate::audit;
use crate::clock::Clock;

/// Message shown to unauthenticated callers for every rejection
pub const ACCESS_DENIED: &str = "access denied";

/// Where a presented token came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    /// Domain or origin of the embedding page
    pub calling_domain: Option<String>,
    /// Network address of the caller
    pub calling_address: Option<String>,
    /// Count this request in the token's usage telemetry
    pub record_usage: bool,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            calling_domain: None,
            calling_address: None,
            record_usage: true,
        }
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.calling_domain = Some(domain.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.calling_address = Some(address.into());
        self
    }

    /// Validate without touching the usage counter, e.g. for previews.
    pub fn without_usage(mut self) -> Self {
        self.record_usage = false;
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What an accepted token grants
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedGrant {
    pub token_id: TokenId,
    pub consent_id: ConsentId,
    pub content: ContentRef,
    pub site_slug: String,
    /// The consent's permission flags at validation time
    pub permissions: Permissions,
    /// Usage counter after this request, when it was recorded
    pub usage_count: Option<u64>,
}

/// Why a presented token was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    NotFound,
    Revoked,
    Expired,
    ConsentWithdrawn,
    DomainNotAllowed,
    StorageUnavailable,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NotFound => "NOT_FOUND",
            RejectReason::Revoked => "REVOKED",
            RejectReason::Expired => "EXPIRED",
            RejectReason::ConsentWithdrawn => "CONSENT_WITHDRAWN",
            RejectReason::DomainNotAllowed => "DOMAIN_NOT_ALLOWED",
            RejectReason::StorageUnavailable => "STORAGE_UNAVAILABLE",
        }
    }

    /// The message for unauthenticated callers. It is the same for every
    /// reason so a caller cannot tell a revoked token from one that never
    /// existed.
    pub fn public_message(&self) -> &'static str {
        ACCESS_DENIED
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = match self {
            RejectReason::NotFound => "no token matches the presented value",
            RejectReason::Revoked => "token has been revoked",
            RejectReason::Expired => "token has expired",
            RejectReason::ConsentWithdrawn => "consent behind the token is no longer approved",
            RejectReason::DomainNotAllowed => "calling domain is not on the token's allow-list",
            RejectReason::StorageUnavailable => "token storage is unavailable",
        };
        write!(f, "{}: {}", self.as_str(), detail)
    }
}

/// Result of presenting a token
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validation {
    Valid(EmbedGrant),
    Rejected(RejectReason),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    pub fn grant(&self) -> Option<&EmbedGrant> {
        match self {
            Validation::Valid(grant) => Some(grant),
            Validation::Rejected(_) => None,
        }
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Validation::Valid(_) => None,
            Validation::Rejected(reason) => Some(*reason),
        }
    }
}

/// Decides whether a presented token may be used and records its use.
///
/// Validation fails closed: a storage error or a storage call that misses
/// the configured deadline rejects the token.
///
/// # Panics
///
/// [`TokenValidator::validate`] uses `tokio::time::timeout` and panics when
/// polled on a Tokio runtime built without the time driver. Build the
/// runtime with `enable_time()` or `enable_all()`.
#[derive(Clone)]
pub struct TokenValidator {
    consents: Arc<dyn ConsentStore>,
    tokens: Arc<dyn TokenStore>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
    storage_timeout: Duration,
}

impl TokenValidator {
    pub fn new(
        consents: Arc<dyn ConsentStore>,
        tokens: Arc<dyn TokenStore>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
        config: &SyndicationConfig,
    ) -> Self {
        Self {
            consents,
            tokens,
            audit,
            clock,
            storage_timeout: config.storage_timeout(),
        }
    }

    /// Validate a presented plaintext token.
    ///
    /// Checks run in order: the token exists, is not revoked, is not past its
    /// own or its consent's expiry, its consent is still approved, and the
    /// calling domain (when given) is on the token's allow-list. On success
    /// the usage counter is incremented as one conditional update, unless
    /// the context opts out.
    pub async fn validate(&self, token: &str, context: &RequestContext) -> Validation {
        let validation = match self.check(token, context).await {
            Ok(validation) => validation,
            Err(e) => {
                warn!(error = %e, "Embed token validation failed closed");
                Validation::Rejected(RejectReason::StorageUnavailable)
            }
        };

        if let Validation::Rejected(reason) = &validation {
            debug!(
                reason = reason.as_str(),
                calling_domain = context.calling_domain.as_deref().unwrap_or(""),
                "Rejected embed token"
            );
        }

        validation
    }

    async fn check(
        &self,
        token: &str,
        context: &RequestContext,
    ) -> Result<Validation, StoreError> {
        let hash = hash_token(token);
        let Some(stored) = self.bounded(self.tokens.find_by_hash(&hash)).await? else {
            return Ok(Validation::Rejected(RejectReason::NotFound));
        };

        let now = self.clock.now();
        match stored.status {
            TokenStatus::Revoked => return Ok(Validation::Rejected(RejectReason::Revoked)),
            TokenStatus::Expired => return Ok(Validation::Rejected(RejectReason::Expired)),
            TokenStatus::Active => {}
        }
        if stored.is_past_expiry(now) {
            self.expire(&stored).await;
            return Ok(Validation::Rejected(RejectReason::Expired));
        }

        let consent = self.bounded(self.consents.get(&stored.consent_id)).await?;
        let consent = match consent {
            Some(consent) if consent.status == ConsentStatus::Approved => consent,
            _ => return Ok(Validation::Rejected(RejectReason::ConsentWithdrawn)),
        };
        if consent.is_lapsed(now) {
            self.expire(&stored).await;
            return Ok(Validation::Rejected(RejectReason::Expired));
        }

        if let Some(calling_domain) = &context.calling_domain {
            if !domain_allowed(&stored.allowed_domains, calling_domain) {
                return Ok(Validation::Rejected(RejectReason::DomainNotAllowed));
            }
        }

        let usage_count = if context.record_usage {
            let usage = UsageUpdate {
                at: now,
                domain: context
                    .calling_domain
                    .as_deref()
                    .map(normalize_domain)
                    .filter(|domain| !domain.is_empty()),
                address: context.calling_address.clone(),
            };
            match self.bounded(self.tokens.record_usage(&stored.id, &usage)).await? {
                Some(count) => Some(count),
                // The token left `active` between the lookup and the update
                None => return self.closed_since_lookup(&stored.id).await,
            }
        } else {
            None
        };

        Ok(Validation::Valid(EmbedGrant {
            token_id: stored.id,
            consent_id: consent.id,
            content: stored.content,
            site_slug: stored.site_slug,
            permissions: consent.permissions,
            usage_count,
        }))
    }

    /// Persist the expiry of a token found past its deadline. Failures are
    /// logged; the token is rejected either way.
    async fn expire(&self, token: &EmbedToken) {
        let now = self.clock.now();
        match self.bounded(self.tokens.mark_expired(&token.id, now)).await {
            Ok(true) => {
                audit::record(
                    self.audit.as_ref(),
                    AuditEvent::for_token(AuditAction::TokenExpired, token, None, now),
                )
                .await;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(token_id = %token.id, error = %e, "Failed to persist embed token expiry");
            }
        }
    }

    async fn closed_since_lookup(&self, token_id: &TokenId) -> Result<Validation, StoreError> {
        let reason = match self.bounded(self.tokens.get(token_id)).await? {
            Some(token) if token.status == TokenStatus::Expired => RejectReason::Expired,
            Some(_) => RejectReason::Revoked,
            None => RejectReason::NotFound,
        };
        Ok(Validation::Rejected(reason))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.storage_timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }
}
