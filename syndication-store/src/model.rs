use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use syndication_token::TokenHash;
use uuid::Uuid;

/// Identifier of a consent record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsentId(Uuid);

impl ConsentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConsentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConsentId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConsentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of an issued embed token. Not a secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(Uuid);

impl TokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TokenId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The content item a consent record exposes
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ContentRef {
    Gallery(String),
    Story(String),
}

impl ContentRef {
    pub fn gallery(id: impl Into<String>) -> Self {
        ContentRef::Gallery(id.into())
    }

    pub fn story(id: impl Into<String>) -> Self {
        ContentRef::Story(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            ContentRef::Gallery(id) | ContentRef::Story(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContentRef::Gallery(_) => "gallery",
            ContentRef::Story(_) => "story",
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Pending,
    Approved,
    Denied,
    Revoked,
}

impl ConsentStatus {
    /// Pending and approved records block a second consent for the same
    /// (content, site) pair.
    pub fn is_active(&self) -> bool {
        matches!(self, ConsentStatus::Pending | ConsentStatus::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentStatus::Pending => "pending",
            ConsentStatus::Approved => "approved",
            ConsentStatus::Denied => "denied",
            ConsentStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an embedding site may do with the content
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permissions {
    pub allow_full_resolution: bool,
    pub allow_download: bool,
    pub allow_embedding: bool,
    pub allow_hotlinking: bool,
}

impl Permissions {
    /// Embedding only, at reduced resolution, no download or hotlinking.
    pub fn embed_only() -> Self {
        Self {
            allow_embedding: true,
            ..Self::default()
        }
    }
}

/// The durable agreement to show one content item on one external site.
///
/// Records are never deleted; `denied` and `revoked` are terminal and kept
/// for audit. The status only moves through [`ConsentTransition`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: ConsentId,
    pub content: ContentRef,
    pub site_slug: String,
    pub status: ConsentStatus,
    pub permissions: Permissions,
    /// Fixed at creation from the content's cultural-sensitivity classification
    pub requires_elder_approval: bool,
    pub cultural_notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub denied_by: Option<String>,
    pub denied_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// Reason given when the record was denied or revoked
    pub status_reason: Option<String>,
}

impl ConsentRecord {
    /// True once the record's own expiry has passed.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Approved and not lapsed.
    pub fn is_in_force(&self, now: DateTime<Utc>) -> bool {
        self.status == ConsentStatus::Approved && !self.is_lapsed(now)
    }
}

/// A guarded status change of a consent record.
///
/// Stores apply a transition only when the record is currently in
/// [`ConsentTransition::from_status`], as one conditional update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsentTransition {
    Approve {
        approver: String,
        at: DateTime<Utc>,
    },
    Deny {
        actor: String,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
    Revoke {
        actor: String,
        reason: Option<String>,
        at: DateTime<Utc>,
    },
}

impl ConsentTransition {
    pub fn from_status(&self) -> ConsentStatus {
        match self {
            ConsentTransition::Approve { .. } | ConsentTransition::Deny { .. } => {
                ConsentStatus::Pending
            }
            ConsentTransition::Revoke { .. } => ConsentStatus::Approved,
        }
    }

    pub fn to_status(&self) -> ConsentStatus {
        match self {
            ConsentTransition::Approve { .. } => ConsentStatus::Approved,
            ConsentTransition::Deny { .. } => ConsentStatus::Denied,
            ConsentTransition::Revoke { .. } => ConsentStatus::Revoked,
        }
    }

    /// Write the transition into `record`. Callers check `from_status` first.
    pub fn apply(&self, record: &mut ConsentRecord) {
        record.status = self.to_status();
        match self {
            ConsentTransition::Approve { approver, at } => {
                record.approved_by = Some(approver.clone());
                record.approved_at = Some(*at);
            }
            ConsentTransition::Deny { actor, reason, at } => {
                record.denied_by = Some(actor.clone());
                record.denied_at = Some(*at);
                record.status_reason = reason.clone();
            }
            ConsentTransition::Revoke { actor, reason, at } => {
                record.revoked_by = Some(actor.clone());
                record.revoked_at = Some(*at);
                record.status_reason = reason.clone();
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Active,
    Revoked,
    Expired,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Revoked => "revoked",
            TokenStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted embed token. Only the hash of the secret is kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedToken {
    pub id: TokenId,
    pub consent_id: ConsentId,
    pub content: ContentRef,
    pub site_slug: String,
    pub token_hash: TokenHash,
    /// Masked form of the secret for re-display, e.g. `abcdefgh...wxyz`
    pub masked: String,
    /// Snapshot of the site's allow-list taken at issuance
    pub allowed_domains: Vec<String>,
    pub status: TokenStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_used_domain: Option<String>,
    pub last_used_address: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub revoked_by: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl EmbedToken {
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Status with expiry recomputed against `now`, whatever the stored
    /// status says.
    pub fn effective_status(&self, now: DateTime<Utc>) -> TokenStatus {
        match self.status {
            TokenStatus::Active if self.is_past_expiry(now) => TokenStatus::Expired,
            status => status,
        }
    }

    /// When the token last left the `active` state, if it has.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            TokenStatus::Active => None,
            TokenStatus::Revoked => self.revoked_at,
            TokenStatus::Expired => self.expired_at.or(self.expires_at),
        }
    }
}

/// Conditional revocation of tokens that are still active
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revocation {
    pub at: DateTime<Utc>,
    pub reason: String,
    pub revoked_by: Option<String>,
}

/// Telemetry written on every successful validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsageUpdate {
    pub at: DateTime<Utc>,
    pub domain: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Active,
    Inactive,
}

/// An external embedding site, owned outside this crate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub slug: String,
    pub name: String,
    pub allowed_domains: Vec<String>,
    pub status: SiteStatus,
}

impl Site {
    pub fn new(slug: impl Into<String>, name: impl Into<String>, domains: &[&str]) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            allowed_domains: domains.iter().map(|d| d.to_string()).collect(),
            status: SiteStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SiteStatus::Active
    }
}

/// Cultural-sensitivity classification of a content item
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CulturalSensitivity {
    #[default]
    Standard,
    Medium,
    High,
    Sacred,
}

/// What this core needs to know about a gallery or story
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentProfile {
    pub content: ContentRef,
    pub owner_id: String,
    pub sensitivity: CulturalSensitivity,
    /// Medium-sensitivity items can be flagged for elder review individually
    #[serde(default)]
    pub elder_review_requested: bool,
}

impl ContentProfile {
    pub fn new(content: ContentRef, owner_id: impl Into<String>) -> Self {
        Self {
            content,
            owner_id: owner_id.into(),
            sensitivity: CulturalSensitivity::Standard,
            elder_review_requested: false,
        }
    }

    pub fn with_sensitivity(mut self, sensitivity: CulturalSensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_elder_review(mut self) -> Self {
        self.elder_review_requested = true;
        self
    }

    pub fn requires_elder_approval(&self) -> bool {
        match self.sensitivity {
            CulturalSensitivity::Standard => false,
            CulturalSensitivity::Medium => self.elder_review_requested,
            CulturalSensitivity::High | CulturalSensitivity::Sacred => true,
        }
    }

    /// Sacred content stays within the community and is never syndicated.
    pub fn is_syndicatable(&self) -> bool {
        self.sensitivity != CulturalSensitivity::Sacred
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ConsentCreated,
    ConsentApproved,
    ConsentDenied,
    ConsentRevoked,
    PermissionsUpdated,
    TokenIssued,
    TokenRevoked,
    TokenExpired,
}

/// One entry of the syndication audit trail
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub at: DateTime<Utc>,
    pub action: AuditAction,
    /// `None` when the change was made by the system itself
    pub actor: Option<String>,
    pub consent_id: ConsentId,
    pub token_id: Option<TokenId>,
    pub content: ContentRef,
    pub site_slug: String,
    pub detail: Option<String>,
}

impl AuditEvent {
    pub fn for_consent(
        action: AuditAction,
        record: &ConsentRecord,
        actor: Option<&str>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            at,
            action,
            actor: actor.map(str::to_string),
            consent_id: record.id,
            token_id: None,
            content: record.content.clone(),
            site_slug: record.site_slug.clone(),
            detail: None,
        }
    }

    pub fn for_token(
        action: AuditAction,
        token: &EmbedToken,
        actor: Option<&str>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            at,
            action,
            actor: actor.map(str::to_string),
            consent_id: token.consent_id,
            token_id: Some(token.id),
            content: token.content.clone(),
            site_slug: token.site_slug.clone(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
