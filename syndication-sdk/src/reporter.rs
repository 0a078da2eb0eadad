use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use syndication_store::{ConsentId, ContentRef, EmbedToken, TokenId, TokenStatus, TokenStore};

use crate::clock::Clock;
use crate::error::SyndicationError;

/// Aggregate token counters for a content item or consent
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub total_tokens: usize,
    pub active_tokens: usize,
    pub revoked_tokens: usize,
    pub expired_tokens: usize,
    /// Sum of usage counters across all tokens
    pub total_requests: u64,
}

impl UsageStats {
    fn tally(tokens: &[EmbedToken], now: DateTime<Utc>) -> Self {
        tokens.iter().fold(Self::default(), |mut stats, token| {
            stats.total_tokens += 1;
            stats.total_requests += token.usage_count;
            match token.effective_status(now) {
                TokenStatus::Active => stats.active_tokens += 1,
                TokenStatus::Revoked => stats.revoked_tokens += 1,
                TokenStatus::Expired => stats.expired_tokens += 1,
            }
            stats
        })
    }
}

/// Owner-facing view of an issued token. Carries the masked secret only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenSummary {
    pub id: TokenId,
    pub consent_id: ConsentId,
    pub content: ContentRef,
    pub site_slug: String,
    pub masked: String,
    pub allowed_domains: Vec<String>,
    /// Status with expiry recomputed at report time
    pub status: TokenStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_used_domain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

impl TokenSummary {
    fn from_token(token: EmbedToken, now: DateTime<Utc>) -> Self {
        Self {
            status: token.effective_status(now),
            id: token.id,
            consent_id: token.consent_id,
            content: token.content,
            site_slug: token.site_slug,
            masked: token.masked,
            allowed_domains: token.allowed_domains,
            expires_at: token.expires_at,
            usage_count: token.usage_count,
            last_used_at: token.last_used_at,
            last_used_domain: token.last_used_domain,
            created_at: token.created_at,
            revoked_at: token.revoked_at,
            revocation_reason: token.revocation_reason,
        }
    }
}

/// Read-only aggregation over issued tokens.
///
/// Expiry is recomputed from `expires_at` so the counts are right even for
/// tokens nobody has presented since they expired.
#[derive(Clone)]
pub struct UsageReporter {
    tokens: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl UsageReporter {
    pub fn new(tokens: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self { tokens, clock }
    }

    pub async fn stats_for_content(
        &self,
        content: &ContentRef,
    ) -> Result<UsageStats, SyndicationError> {
        let tokens = self.tokens.list_for_content(content).await?;
        Ok(UsageStats::tally(&tokens, self.clock.now()))
    }

    pub async fn stats_for_consent(
        &self,
        consent_id: &ConsentId,
    ) -> Result<UsageStats, SyndicationError> {
        let tokens = self.tokens.list_for_consent(consent_id).await?;
        Ok(UsageStats::tally(&tokens, self.clock.now()))
    }

    pub async fn tokens_for_content(
        &self,
        content: &ContentRef,
    ) -> Result<Vec<TokenSummary>, SyndicationError> {
        let now = self.clock.now();
        Ok(self
            .tokens
            .list_for_content(content)
            .await?
            .into_iter()
            .map(|token| TokenSummary::from_token(token, now))
            .collect())
    }

    pub async fn tokens_for_consent(
        &self,
        consent_id: &ConsentId,
    ) -> Result<Vec<TokenSummary>, SyndicationError> {
        let now = self.clock.now();
        Ok(self
            .tokens
            .list_for_consent(consent_id)
            .await?
            .into_iter()
            .map(|token| TokenSummary::from_token(token, now))
            .collect())
    }
}
