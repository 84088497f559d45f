//! Remote service contract and the entity model the workflows operate on.
//!
//! The workflows only see [`RemoteClient`]; the grammers-backed
//! implementation lives in [`crate::telegram`].

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// What kind of peer an entity is. Workflows dispatch on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User { bot: bool, deleted: bool },
    Group,
    Channel { megagroup: bool },
}

/// A resolved user, group or channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntity {
    pub id: i64,
    pub access_hash: Option<i64>,
    pub username: Option<String>,
    pub name: String,
    pub kind: EntityKind,
}

impl RemoteEntity {
    pub fn is_bot(&self) -> bool {
        matches!(self.kind, EntityKind::User { bot: true, .. })
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.kind, EntityKind::User { deleted: true, .. })
    }

    /// Groups and channels are left; users and bots get their history deleted.
    pub fn is_group_like(&self) -> bool {
        matches!(self.kind, EntityKind::Group | EntityKind::Channel { .. })
    }

    /// Identifier persisted for bots: username when present, numeric id otherwise.
    pub fn bot_id(&self) -> String {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// How a caller names an entity that still needs resolving.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// Public username (without @)
    Username(String),
    /// Bare numeric id, resolvable only through known dialogs
    Id(i64),
    /// User id with its access hash
    User { id: i64, access_hash: i64 },
}

impl EntityRef {
    /// Parse a persisted bot identifier: digits mean an id, anything else a username.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return EntityRef::Id(id);
        }
        EntityRef::Username(trimmed.strip_prefix('@').unwrap_or(trimmed).to_string())
    }

    /// Cache key for this reference.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Username(name) => write!(f, "@{}", name),
            EntityRef::Id(id) => write!(f, "{}", id),
            EntityRef::User { id, access_hash } => write!(f, "{}:{}", id, access_hash),
        }
    }
}

/// A message as seen by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMessage {
    pub id: i32,
    pub text: String,
}

/// Operations the cleaner needs from the messaging service.
///
/// Implementations report rate limiting as [`crate::Error::FloodWait`] and
/// unresolvable or vanished peers as [`crate::Error::PeerInvalid`].
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Every dialog of the account, as entities.
    async fn dialogs(&self) -> Result<Vec<RemoteEntity>>;

    async fn resolve(&self, target: &EntityRef) -> Result<RemoteEntity>;

    async fn send_message(&self, target: &RemoteEntity, text: &str) -> Result<()>;

    /// Most recent messages first, at most `limit`.
    async fn recent_messages(&self, target: &RemoteEntity, limit: usize)
        -> Result<Vec<RemoteMessage>>;

    async fn delete_history(&self, target: &RemoteEntity, revoke: bool) -> Result<()>;

    async fn leave_channel(&self, target: &RemoteEntity) -> Result<()>;
}
