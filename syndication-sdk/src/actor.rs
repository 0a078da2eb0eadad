use serde::{Deserialize, Serialize};
use syndication_store::{ContentDirectory, ContentRef};

use crate::error::SyndicationError;

/// Identity recorded for changes made by the service itself, such as the
/// cascade that follows content removal.
pub const SYSTEM_ACTOR: &str = "system";

/// Roles relevant to syndication decisions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Storyteller,
    Elder,
    Moderator,
    Admin,
}

impl Role {
    /// Elders, moderators and admins may act on content they do not own.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Elder | Role::Moderator | Role::Admin)
    }
}

/// An authenticated caller, as resolved by the boundary in front of this
/// crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    pub fn storyteller(id: impl Into<String>) -> Self {
        Self::new(id).with_role(Role::Storyteller)
    }

    pub fn elder(id: impl Into<String>) -> Self {
        Self::new(id).with_role(Role::Elder)
    }

    pub fn moderator(id: impl Into<String>) -> Self {
        Self::new(id).with_role(Role::Moderator)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id).with_role(Role::Admin)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_elevated(&self) -> bool {
        self.roles.iter().any(Role::is_elevated)
    }

    /// Only elders and admins can sign off an elder-gated consent.
    pub fn can_approve(&self) -> bool {
        self.has_role(Role::Elder) || self.has_role(Role::Admin)
    }
}

/// Allow `actor` if it owns `content` or holds an elevated role.
///
/// When the content item is no longer in the directory, `fallback_owner`
/// (the consent creator) stands in for the owner.
pub(crate) async fn ensure_owner_or_elevated(
    content_directory: &dyn ContentDirectory,
    actor: &Actor,
    content: &ContentRef,
    fallback_owner: Option<&str>,
) -> Result<(), SyndicationError> {
    if actor.is_elevated() {
        return Ok(());
    }

    let owner = match content_directory.profile(content).await? {
        Some(profile) => Some(profile.owner_id),
        None => fallback_owner.map(str::to_string),
    };

    if owner.as_deref() == Some(actor.id.as_str()) {
        Ok(())
    } else {
        Err(SyndicationError::Forbidden(format!(
            "{} is neither the owner of {} nor an elder, moderator or admin",
            actor.id, content
        )))
    }
}
