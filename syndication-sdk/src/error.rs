use serde::{Deserialize, Serialize};
use std::fmt;
use syndication_config::ConfigError;
use syndication_store::{ConsentId, ConsentStatus, ContentRef, StoreError, TokenId};
use thiserror::Error;

/// Stable error codes for the management path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidState,
    Forbidden,
    DuplicateConsent,
    ConsentNotApproved,
    SiteInactive,
    ExpiryOutOfRange,
    CulturallyRestricted,
    StorageUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::DuplicateConsent => "DUPLICATE_CONSENT",
            ErrorCode::ConsentNotApproved => "CONSENT_NOT_APPROVED",
            ErrorCode::SiteInactive => "SITE_INACTIVE",
            ErrorCode::ExpiryOutOfRange => "EXPIRY_OUT_OF_RANGE",
            ErrorCode::CulturallyRestricted => "CULTURALLY_RESTRICTED",
            ErrorCode::StorageUnavailable => "STORAGE_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of consent, issuance and revocation operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyndicationError {
    #[error("Consent {0} not found")]
    ConsentNotFound(ConsentId),

    #[error("Embed token {0} not found")]
    TokenNotFound(TokenId),

    #[error("Content {0} not found")]
    ContentNotFound(ContentRef),

    #[error("Site {0} not found")]
    SiteNotFound(String),

    /// The consent is not in a status the operation can start from
    #[error("Cannot {operation} consent {id} while it is {status}")]
    InvalidState {
        id: ConsentId,
        status: ConsentStatus,
        operation: &'static str,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("A pending or approved consent already exists for {content} on {site_slug}")]
    DuplicateConsent {
        content: ContentRef,
        site_slug: String,
    },

    #[error("Consent {0} is not approved")]
    ConsentNotApproved(ConsentId),

    #[error("Site {0} is inactive")]
    SiteInactive(String),

    #[error("Requested expiry of {requested} days is outside 1..={max}")]
    ExpiryOutOfRange { requested: u32, max: u32 },

    /// Sacred content is never syndicated
    #[error("{0} is culturally restricted and cannot be syndicated")]
    CulturallyRestricted(ContentRef),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] StoreError),
}

impl SyndicationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SyndicationError::ConsentNotFound(_)
            | SyndicationError::TokenNotFound(_)
            | SyndicationError::ContentNotFound(_)
            | SyndicationError::SiteNotFound(_) => ErrorCode::NotFound,
            SyndicationError::InvalidState { .. } => ErrorCode::InvalidState,
            SyndicationError::Forbidden(_) => ErrorCode::Forbidden,
            SyndicationError::DuplicateConsent { .. } => ErrorCode::DuplicateConsent,
            SyndicationError::ConsentNotApproved(_) => ErrorCode::ConsentNotApproved,
            SyndicationError::SiteInactive(_) => ErrorCode::SiteInactive,
            SyndicationError::ExpiryOutOfRange { .. } => ErrorCode::ExpiryOutOfRange,
            SyndicationError::CulturallyRestricted(_) => ErrorCode::CulturallyRestricted,
            SyndicationError::Storage(_) => ErrorCode::StorageUnavailable,
        }
    }
}

/// Errors that can occur while assembling a [`crate::Syndication`] service
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required storage backend was not supplied to the builder
    #[error("Missing component: {0}")]
    MissingComponent(&'static str),
}
