//! In-memory backends for the storage traits.
//!
//! Each store keeps its rows behind one `tokio::sync::RwLock`, so every
//! conditional update is a single critical section and behaves like a
//! `UPDATE ... WHERE status = ...` against a relational store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use syndication_token::TokenHash;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::model::{
    AuditEvent, ConsentId, ConsentRecord, ConsentTransition, ContentProfile, ContentRef,
    EmbedToken, Permissions, Revocation, Site, SiteStatus, TokenId, TokenStatus, UsageUpdate,
};
use crate::store::{AuditLog, ConsentStore, ContentDirectory, SiteDirectory, TokenStore};

#[derive(Debug, Default)]
pub struct MemoryConsentStore {
    records: RwLock<HashMap<ConsentId, ConsentRecord>>,
}

impl MemoryConsentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConsentStore for MemoryConsentStore {
    async fn insert(&self, record: ConsentRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;

        let duplicate = records.values().any(|existing| {
            existing.status.is_active()
                && existing.content == record.content
                && existing.site_slug == record.site_slug
        });
        if duplicate {
            return Err(StoreError::conflict(format!(
                "active consent already exists for {} on {}",
                record.content, record.site_slug
            )));
        }
        if records.contains_key(&record.id) {
            return Err(StoreError::conflict(format!(
                "consent {} already exists",
                record.id
            )));
        }

        records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: &ConsentId) -> Result<Option<ConsentRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn transition(
        &self,
        id: &ConsentId,
        transition: &ConsentTransition,
    ) -> Result<Option<ConsentRecord>, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(id) {
            Some(record) if record.status == transition.from_status() => {
                transition.apply(record);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn update_permissions(
        &self,
        id: &ConsentId,
        permissions: Permissions,
    ) -> Result<Option<ConsentRecord>, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(id) {
            Some(record) if record.status.is_active() => {
                record.permissions = permissions;
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_for_content(
        &self,
        content: &ContentRef,
    ) -> Result<Vec<ConsentRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<ConsentRecord> = records
            .values()
            .filter(|record| &record.content == content)
            .cloned()
            .collect();
        matching.sort_by_key(|record| record.created_at);
        Ok(matching)
    }

    async fn list_for_site(&self, site_slug: &str) -> Result<Vec<ConsentRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<ConsentRecord> = records
            .values()
            .filter(|record| record.site_slug == site_slug)
            .cloned()
            .collect();
        matching.sort_by_key(|record| record.created_at);
        Ok(matching)
    }
}

#[derive(Debug, Default)]
struct TokenTable {
    by_id: HashMap<TokenId, EmbedToken>,
    by_hash: HashMap<TokenHash, TokenId>,
}

impl TokenTable {
    fn active_mut(&mut self, id: &TokenId) -> Option<&mut EmbedToken> {
        self.by_id
            .get_mut(id)
            .filter(|token| token.status == TokenStatus::Active)
    }
}

fn apply_revocation(token: &mut EmbedToken, revocation: &Revocation) {
    token.status = TokenStatus::Revoked;
    token.revoked_at = Some(revocation.at);
    token.revoked_by = revocation.revoked_by.clone();
    token.revocation_reason = Some(revocation.reason.clone());
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    table: RwLock<TokenTable>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored token rows, in any status
    pub async fn len(&self) -> usize {
        self.table.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, token: EmbedToken) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        if table.by_hash.contains_key(&token.token_hash) {
            return Err(StoreError::conflict("token hash already present"));
        }
        if table.by_id.contains_key(&token.id) {
            return Err(StoreError::conflict(format!(
                "token {} already exists",
                token.id
            )));
        }
        table.by_hash.insert(token.token_hash.clone(), token.id);
        table.by_id.insert(token.id, token);
        Ok(())
    }

    async fn find_by_hash(&self, hash: &TokenHash) -> Result<Option<EmbedToken>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .by_hash
            .get(hash)
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn get(&self, id: &TokenId) -> Result<Option<EmbedToken>, StoreError> {
        Ok(self.table.read().await.by_id.get(id).cloned())
    }

    async fn list_for_consent(
        &self,
        consent_id: &ConsentId,
    ) -> Result<Vec<EmbedToken>, StoreError> {
        let table = self.table.read().await;
        let mut matching: Vec<EmbedToken> = table
            .by_id
            .values()
            .filter(|token| &token.consent_id == consent_id)
            .cloned()
            .collect();
        matching.sort_by_key(|token| token.created_at);
        Ok(matching)
    }

    async fn list_for_content(&self, content: &ContentRef) -> Result<Vec<EmbedToken>, StoreError> {
        let table = self.table.read().await;
        let mut matching: Vec<EmbedToken> = table
            .by_id
            .values()
            .filter(|token| &token.content == content)
            .cloned()
            .collect();
        matching.sort_by_key(|token| token.created_at);
        Ok(matching)
    }

    async fn record_usage(
        &self,
        id: &TokenId,
        usage: &UsageUpdate,
    ) -> Result<Option<u64>, StoreError> {
        let mut table = self.table.write().await;
        Ok(table.active_mut(id).map(|token| {
            token.usage_count += 1;
            token.last_used_at = Some(usage.at);
            token.last_used_domain = usage.domain.clone();
            token.last_used_address = usage.address.clone();
            token.usage_count
        }))
    }

    async fn mark_expired(&self, id: &TokenId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut table = self.table.write().await;
        Ok(table
            .active_mut(id)
            .map(|token| {
                token.status = TokenStatus::Expired;
                token.expired_at = Some(at);
            })
            .is_some())
    }

    async fn revoke(&self, id: &TokenId, revocation: &Revocation) -> Result<bool, StoreError> {
        let mut table = self.table.write().await;
        Ok(table
            .active_mut(id)
            .map(|token| apply_revocation(token, revocation))
            .is_some())
    }

    async fn revoke_active_for_consent(
        &self,
        consent_id: &ConsentId,
        revocation: &Revocation,
    ) -> Result<Vec<TokenId>, StoreError> {
        let mut table = self.table.write().await;
        let mut revoked = Vec::new();
        for token in table.by_id.values_mut() {
            if &token.consent_id == consent_id && token.status == TokenStatus::Active {
                apply_revocation(token, revocation);
                revoked.push(token.id);
            }
        }
        Ok(revoked)
    }

    async fn purge_closed_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut table = self.table.write().await;
        let stale: Vec<(TokenId, TokenHash)> = table
            .by_id
            .values()
            .filter(|token| {
                // Active rows past their deadline count from `expires_at`
                token
                    .closed_at()
                    .or(token.expires_at)
                    .is_some_and(|closed| closed < cutoff)
            })
            .map(|token| (token.id, token.token_hash.clone()))
            .collect();

        for (id, hash) in &stale {
            table.by_id.remove(id);
            table.by_hash.remove(hash);
        }
        Ok(stale.len())
    }
}

/// Sites and content profiles, seeded by the embedding application
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    sites: RwLock<HashMap<String, Site>>,
    content: RwLock<HashMap<ContentRef, ContentProfile>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_site(&self, site: Site) {
        self.sites.write().await.insert(site.slug.clone(), site);
    }

    /// Returns false if no site has this slug.
    pub async fn set_site_status(&self, slug: &str, status: SiteStatus) -> bool {
        match self.sites.write().await.get_mut(slug) {
            Some(site) => {
                site.status = status;
                true
            }
            None => false,
        }
    }

    /// Returns false if no site has this slug.
    pub async fn set_site_domains(&self, slug: &str, domains: Vec<String>) -> bool {
        match self.sites.write().await.get_mut(slug) {
            Some(site) => {
                site.allowed_domains = domains;
                true
            }
            None => false,
        }
    }

    pub async fn put_content(&self, profile: ContentProfile) {
        self.content
            .write()
            .await
            .insert(profile.content.clone(), profile);
    }

    pub async fn remove_content(&self, content: &ContentRef) -> Option<ContentProfile> {
        self.content.write().await.remove(content)
    }
}

#[async_trait]
impl SiteDirectory for MemoryDirectory {
    async fn site(&self, slug: &str) -> Result<Option<Site>, StoreError> {
        Ok(self.sites.read().await.get(slug).cloned())
    }
}

#[async_trait]
impl ContentDirectory for MemoryDirectory {
    async fn profile(&self, content: &ContentRef) -> Result<Option<ContentProfile>, StoreError> {
        Ok(self.content.read().await.get(content).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded event, oldest first
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<(), StoreError> {
        self.events.write().await.push(event);
        Ok(())
    }
}
