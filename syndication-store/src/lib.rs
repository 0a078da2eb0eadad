//! # Syndication Store
//!
//! Records and storage seams for the syndication consent lifecycle.
//!
//! The data model ([`ConsentRecord`], [`EmbedToken`], [`Site`],
//! [`ContentProfile`], [`AuditEvent`]) is shared by every backend. Backends
//! implement the async traits in this crate; the in-memory implementations
//! shipped here are used by tests and by embedders that do not need
//! durability.
//!
//! ## Guarantees expected from a backend
//!
//! - Consent status changes are conditional on the current status
//! - At most one pending or approved consent exists per (content, site) pair
//! - Token mutations only apply while the token is `active`
//! - Token lookup is by hash; the plaintext secret is never stored
//!
//! ## Usage
//!
//! ```
//! use syndication_store::{ConsentStore, MemoryConsentStore};
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let store = MemoryConsentStore::new();
//!     let consents = store.list_for_site("partner-news").await.unwrap();
//!     assert!(consents.is_empty());
//! });
//! ```

mod error;
mod memory;
mod model;
mod store;

pub use error::StoreError;
pub use memory::{MemoryAuditLog, MemoryConsentStore, MemoryDirectory, MemoryTokenStore};
pub use model::{
    AuditAction, AuditEvent, ConsentId, ConsentRecord, ConsentStatus, ConsentTransition,
    ContentProfile, ContentRef, CulturalSensitivity, EmbedToken, Permissions, Revocation, Site,
    SiteStatus, TokenId, TokenStatus, UsageUpdate,
};
pub use store::{AuditLog, ConsentStore, ContentDirectory, SiteDirectory, TokenStore};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;
    use syndication_token::generate_token;

    fn epoch() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn consent(content: &ContentRef, site: &str, status: ConsentStatus) -> ConsentRecord {
        ConsentRecord {
            id: ConsentId::new(),
            content: content.clone(),
            site_slug: site.to_string(),
            status,
            permissions: Permissions::embed_only(),
            requires_elder_approval: false,
            cultural_notes: None,
            expires_at: None,
            created_by: "owner-1".to_string(),
            created_at: epoch(),
            approved_by: None,
            approved_at: None,
            denied_by: None,
            denied_at: None,
            revoked_by: None,
            revoked_at: None,
            status_reason: None,
        }
    }

    fn token(consent: &ConsentRecord) -> EmbedToken {
        let (plaintext, hash) = generate_token();
        EmbedToken {
            id: TokenId::new(),
            consent_id: consent.id,
            content: consent.content.clone(),
            site_slug: consent.site_slug.clone(),
            token_hash: hash,
            masked: plaintext.masked(),
            allowed_domains: vec!["example.org".to_string()],
            status: TokenStatus::Active,
            expires_at: Some(epoch() + Duration::days(30)),
            usage_count: 0,
            last_used_at: None,
            last_used_domain: None,
            last_used_address: None,
            created_by: "owner-1".to_string(),
            created_at: epoch(),
            revoked_by: None,
            revoked_at: None,
            revocation_reason: None,
            expired_at: None,
        }
    }

    fn revocation(reason: &str) -> Revocation {
        Revocation {
            at: epoch() + Duration::hours(1),
            reason: reason.to_string(),
            revoked_by: Some("owner-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_second_active_consent_for_pair_conflicts() {
        let store = MemoryConsentStore::new();
        let story = ContentRef::story("s-1");

        store
            .insert(consent(&story, "partner", ConsentStatus::Pending))
            .await
            .unwrap();
        let err = store
            .insert(consent(&story, "partner", ConsentStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Other sites and terminal records do not block
        store
            .insert(consent(&story, "other-site", ConsentStatus::Pending))
            .await
            .unwrap();
        let gallery = ContentRef::gallery("g-1");
        store
            .insert(consent(&gallery, "partner", ConsentStatus::Revoked))
            .await
            .unwrap();
        store
            .insert(consent(&gallery, "partner", ConsentStatus::Pending))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transition_is_conditional_on_status() {
        let store = MemoryConsentStore::new();
        let record = consent(&ContentRef::story("s-1"), "partner", ConsentStatus::Pending);
        let id = record.id;
        store.insert(record).await.unwrap();

        let revoke = ConsentTransition::Revoke {
            actor: "owner-1".to_string(),
            reason: None,
            at: epoch(),
        };
        // Pending records cannot be revoked
        assert!(store.transition(&id, &revoke).await.unwrap().is_none());

        let approve = ConsentTransition::Approve {
            approver: "elder-1".to_string(),
            at: epoch(),
        };
        let approved = store.transition(&id, &approve).await.unwrap().unwrap();
        assert_eq!(approved.status, ConsentStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("elder-1"));

        // Approving twice does nothing the second time
        assert!(store.transition(&id, &approve).await.unwrap().is_none());

        let revoked = store.transition(&id, &revoke).await.unwrap().unwrap();
        assert_eq!(revoked.status, ConsentStatus::Revoked);
        assert!(store.transition(&id, &revoke).await.unwrap().is_none());

        // Terminal records keep their permissions
        let perms = Permissions {
            allow_download: true,
            ..Permissions::default()
        };
        assert!(store.update_permissions(&id, perms).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_approvals_apply_once() {
        let store = Arc::new(MemoryConsentStore::new());
        let record = consent(&ContentRef::story("s-1"), "partner", ConsentStatus::Pending);
        let id = record.id;
        store.insert(record).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let approve = ConsentTransition::Approve {
                    approver: format!("elder-{i}"),
                    at: epoch(),
                };
                store.transition(&id, &approve).await.unwrap().is_some()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn test_token_mutations_only_apply_while_active() {
        let store = MemoryTokenStore::new();
        let record = consent(&ContentRef::story("s-1"), "partner", ConsentStatus::Approved);
        let issued = token(&record);
        let id = issued.id;
        let hash = issued.token_hash.clone();
        store.insert(issued).await.unwrap();

        let usage = UsageUpdate {
            at: epoch(),
            domain: Some("example.org".to_string()),
            address: None,
        };
        assert_eq!(store.record_usage(&id, &usage).await.unwrap(), Some(1));
        assert_eq!(store.record_usage(&id, &usage).await.unwrap(), Some(2));

        assert!(store.revoke(&id, &revocation("done")).await.unwrap());
        assert!(!store.revoke(&id, &revocation("again")).await.unwrap());
        assert!(!store.mark_expired(&id, epoch()).await.unwrap());
        assert_eq!(store.record_usage(&id, &usage).await.unwrap(), None);

        let stored = store.find_by_hash(&hash).await.unwrap().unwrap();
        assert_eq!(stored.status, TokenStatus::Revoked);
        assert_eq!(stored.usage_count, 2);
        assert_eq!(stored.revocation_reason.as_deref(), Some("done"));
        assert_eq!(stored.last_used_domain.as_deref(), Some("example.org"));
    }

    #[tokio::test]
    async fn test_duplicate_hash_is_rejected() {
        let store = MemoryTokenStore::new();
        let record = consent(&ContentRef::story("s-1"), "partner", ConsentStatus::Approved);
        let first = token(&record);
        let mut second = token(&record);
        second.token_hash = first.token_hash.clone();

        store.insert(first).await.unwrap();
        assert!(matches!(
            store.insert(second).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_revoke_active_for_consent_is_idempotent() {
        let store = MemoryTokenStore::new();
        let record = consent(&ContentRef::story("s-1"), "partner", ConsentStatus::Approved);
        let other = consent(&ContentRef::story("s-2"), "partner", ConsentStatus::Approved);

        let a = token(&record);
        let b = token(&record);
        let expired = token(&record);
        let unrelated = token(&other);
        let expired_id = expired.id;
        let unrelated_id = unrelated.id;
        for t in [a, b, expired, unrelated] {
            store.insert(t).await.unwrap();
        }
        assert!(store.mark_expired(&expired_id, epoch()).await.unwrap());

        let revoked = store
            .revoke_active_for_consent(&record.id, &revocation("consent revoked"))
            .await
            .unwrap();
        assert_eq!(revoked.len(), 2);

        let again = store
            .revoke_active_for_consent(&record.id, &revocation("consent revoked"))
            .await
            .unwrap();
        assert!(again.is_empty());

        let untouched = store.get(&unrelated_id).await.unwrap().unwrap();
        assert_eq!(untouched.status, TokenStatus::Active);
        let still_expired = store.get(&expired_id).await.unwrap().unwrap();
        assert_eq!(still_expired.status, TokenStatus::Expired);
    }

    #[tokio::test]
    async fn test_purge_removes_only_closed_tokens_before_cutoff() {
        let store = MemoryTokenStore::new();
        let record = consent(&ContentRef::story("s-1"), "partner", ConsentStatus::Approved);

        let active = token(&record);
        let old = token(&record);
        let old_id = old.id;
        let old_hash = old.token_hash.clone();
        store.insert(active).await.unwrap();
        store.insert(old).await.unwrap();
        store.revoke(&old_id, &revocation("stale")).await.unwrap();

        // Revoked an hour after epoch, so a cutoff at epoch keeps it
        assert_eq!(store.purge_closed_before(epoch()).await.unwrap(), 0);
        let cutoff = epoch() + Duration::days(1);
        assert_eq!(store.purge_closed_before(cutoff).await.unwrap(), 1);

        assert!(store.get(&old_id).await.unwrap().is_none());
        assert!(store.find_by_hash(&old_hash).await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_directory_lookups() {
        let directory = MemoryDirectory::new();
        directory
            .put_site(Site::new("partner", "Partner News", &["partner.net"]))
            .await;
        let story = ContentRef::story("s-1");
        directory
            .put_content(
                ContentProfile::new(story.clone(), "owner-1")
                    .with_sensitivity(CulturalSensitivity::Medium)
                    .with_elder_review(),
            )
            .await;

        let site = directory.site("partner").await.unwrap().unwrap();
        assert!(site.is_active());
        assert!(directory.set_site_status("partner", SiteStatus::Inactive).await);
        assert!(!directory.set_site_status("missing", SiteStatus::Inactive).await);
        assert!(!directory.site("partner").await.unwrap().unwrap().is_active());

        let profile = directory.profile(&story).await.unwrap().unwrap();
        assert!(profile.requires_elder_approval());
        assert!(directory.remove_content(&story).await.is_some());
        assert!(directory.profile(&story).await.unwrap().is_none());
    }

    #[test]
    fn test_content_profile_classification() {
        let story = ContentRef::story("s-1");
        let standard = ContentProfile::new(story.clone(), "o");
        let medium = standard.clone().with_sensitivity(CulturalSensitivity::Medium);
        let flagged = medium.clone().with_elder_review();
        let high = standard.clone().with_sensitivity(CulturalSensitivity::High);
        let sacred = standard.clone().with_sensitivity(CulturalSensitivity::Sacred);

        assert!(!standard.requires_elder_approval());
        assert!(!medium.requires_elder_approval());
        assert!(flagged.requires_elder_approval());
        assert!(high.requires_elder_approval());
        assert!(high.is_syndicatable());
        assert!(!sacred.is_syndicatable());
    }

    #[test]
    fn test_token_effective_status_and_closed_at() {
        let record = consent(&ContentRef::story("s-1"), "partner", ConsentStatus::Approved);
        let mut t = token(&record);
        let expiry = t.expires_at.unwrap();

        assert_eq!(t.effective_status(expiry), TokenStatus::Active);
        assert_eq!(
            t.effective_status(expiry + Duration::seconds(1)),
            TokenStatus::Expired
        );
        assert_eq!(t.closed_at(), None);

        t.status = TokenStatus::Expired;
        assert_eq!(t.closed_at(), Some(expiry));
    }

    #[test]
    fn test_content_ref_serialization() {
        let json = serde_json::to_string(&ContentRef::gallery("g-7")).unwrap();
        assert_eq!(json, r#"{"type":"gallery","id":"g-7"}"#);
        assert_eq!(ContentRef::story("s-1").to_string(), "story:s-1");
    }
}
