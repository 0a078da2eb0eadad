use async_trait::async_trait;
use chrono::{DateTime, Utc};
use syndication_token::TokenHash;

use crate::error::StoreError;
use crate::model::{
    AuditEvent, ConsentId, ConsentRecord, ConsentTransition, ContentProfile, ContentRef,
    EmbedToken, Permissions, Revocation, Site, TokenId, UsageUpdate,
};

/// Persistence of consent records.
///
/// Every status change goes through [`ConsentStore::transition`], a
/// conditional update keyed on the record's current status, so concurrent
/// approvals or revocations of the same record cannot both succeed.
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Insert a new record.
    ///
    /// Fails with [`StoreError::Conflict`] when a pending or approved record
    /// already exists for the same (content, site) pair. The check and the
    /// insert are one atomic step.
    async fn insert(&self, record: ConsentRecord) -> Result<(), StoreError>;

    async fn get(&self, id: &ConsentId) -> Result<Option<ConsentRecord>, StoreError>;

    /// Apply `transition` if the record is currently in its `from_status`.
    ///
    /// Returns the updated record, or `None` if the record does not exist or
    /// is in any other status.
    async fn transition(
        &self,
        id: &ConsentId,
        transition: &ConsentTransition,
    ) -> Result<Option<ConsentRecord>, StoreError>;

    /// Replace the permission flags of a pending or approved record.
    ///
    /// Returns `None` if the record does not exist or is terminal.
    async fn update_permissions(
        &self,
        id: &ConsentId,
        permissions: Permissions,
    ) -> Result<Option<ConsentRecord>, StoreError>;

    async fn list_for_content(&self, content: &ContentRef)
        -> Result<Vec<ConsentRecord>, StoreError>;

    async fn list_for_site(&self, site_slug: &str) -> Result<Vec<ConsentRecord>, StoreError>;
}

/// Persistence of issued embed tokens, indexed by id and by hash.
///
/// Mutations are conditional on the token still being `active`; they report
/// whether they applied instead of failing.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a freshly issued token. A duplicate hash is a
    /// [`StoreError::Conflict`].
    async fn insert(&self, token: EmbedToken) -> Result<(), StoreError>;

    async fn find_by_hash(&self, hash: &TokenHash) -> Result<Option<EmbedToken>, StoreError>;

    async fn get(&self, id: &TokenId) -> Result<Option<EmbedToken>, StoreError>;

    async fn list_for_consent(&self, consent_id: &ConsentId)
        -> Result<Vec<EmbedToken>, StoreError>;

    async fn list_for_content(&self, content: &ContentRef) -> Result<Vec<EmbedToken>, StoreError>;

    /// Increment the usage counter and write last-used telemetry, only while
    /// the token is active.
    ///
    /// Returns the new counter value, or `None` if the token is missing or
    /// no longer active.
    async fn record_usage(
        &self,
        id: &TokenId,
        usage: &UsageUpdate,
    ) -> Result<Option<u64>, StoreError>;

    /// Flip an active token to `expired`. Returns whether it changed.
    async fn mark_expired(&self, id: &TokenId, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Revoke one token if it is active. Returns whether it changed.
    async fn revoke(&self, id: &TokenId, revocation: &Revocation) -> Result<bool, StoreError>;

    /// Revoke every active token minted from `consent_id`.
    ///
    /// Returns the ids that changed; tokens already revoked or expired are
    /// left alone, so repeating the call returns an empty list.
    async fn revoke_active_for_consent(
        &self,
        consent_id: &ConsentId,
        revocation: &Revocation,
    ) -> Result<Vec<TokenId>, StoreError>;

    /// Delete revoked and expired tokens that left the active state before
    /// `cutoff`, including tokens still stored as active whose `expires_at`
    /// precedes it. Returns how many rows were removed.
    async fn purge_closed_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Read-only view of registered embedding sites
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    async fn site(&self, slug: &str) -> Result<Option<Site>, StoreError>;
}

/// Read-only view of galleries and stories: ownership and cultural
/// classification
#[async_trait]
pub trait ContentDirectory: Send + Sync {
    async fn profile(&self, content: &ContentRef) -> Result<Option<ContentProfile>, StoreError>;
}

/// Sink for the syndication audit trail
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), StoreError>;
}
