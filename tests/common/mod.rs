#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use syndication::{
    Actor, ConsentRecord, ConsentRequest, ContentProfile, ContentRef, ManualClock,
    MemoryAuditLog, MemoryConsentStore, MemoryDirectory, MemoryTokenStore, Site, Syndication,
    SyndicationBuilder,
};

pub const OWNER: &str = "teller-1";
pub const SITE: &str = "partner";

/// A syndication service over in-memory stores, with handles to every
/// backend so tests can inspect or change them directly.
pub struct TestEnv {
    pub syndication: Syndication,
    pub consents: Arc<MemoryConsentStore>,
    pub tokens: Arc<MemoryTokenStore>,
    pub directory: Arc<MemoryDirectory>,
    pub audit: Arc<MemoryAuditLog>,
    pub clock: Arc<ManualClock>,
    pub story: ContentRef,
    pub owner: Actor,
}

pub async fn env() -> TestEnv {
    env_with(|builder| builder).await
}

pub async fn env_with(configure: impl FnOnce(SyndicationBuilder) -> SyndicationBuilder) -> TestEnv {
    let consents = Arc::new(MemoryConsentStore::new());
    let tokens = Arc::new(MemoryTokenStore::new());
    let directory = Arc::new(MemoryDirectory::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
    ));

    directory
        .put_site(Site::new(SITE, "Partner News", &["example.org"]))
        .await;
    let story = ContentRef::story("story-1");
    directory
        .put_content(ContentProfile::new(story.clone(), OWNER))
        .await;

    let builder = Syndication::builder()
        .consent_store(consents.clone())
        .token_store(tokens.clone())
        .directory(directory.clone())
        .audit_log(audit.clone())
        .clock(clock.clone());
    let syndication = configure(builder).build().unwrap();

    TestEnv {
        syndication,
        consents,
        tokens,
        directory,
        audit,
        clock,
        story,
        owner: Actor::storyteller(OWNER),
    }
}

impl TestEnv {
    /// Create an ungated, immediately approved consent for the test story
    pub async fn approved_consent(&self) -> ConsentRecord {
        self.syndication
            .create_consent(ConsentRequest::new(self.story.clone(), SITE), &self.owner)
            .await
            .unwrap()
    }
}
