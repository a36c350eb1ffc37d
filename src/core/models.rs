use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use slack_morphism::{SlackBotId, SlackTs, SlackUserId};

pub const SUBTYPE_FILE_COMMENT: &str = "file_comment";
pub const SUBTYPE_BOT_MESSAGE: &str = "bot_message";

/// One channel event as returned by `conversations.history`.
///
/// Fields the archiver doesn't interpret are kept in `extra` so the cache
/// artifact stays a faithful copy of what the API returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub ts: SlackTs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SlackUserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<FileComment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<SlackBotId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icons: Option<BotIcons>,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawMessage {
    #[must_use]
    pub fn is_file_comment(&self) -> bool {
        self.subtype.as_deref() == Some(SUBTYPE_FILE_COMMENT)
    }

    #[must_use]
    pub fn is_bot_message(&self) -> bool {
        self.subtype.as_deref() == Some(SUBTYPE_BOT_MESSAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileComment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SlackUserId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotIcons {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_48: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A member of the workspace as returned by `users.list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: SlackUserId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_72: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Identity fabricated for a bot post; never written back to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticUser {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
}

/// Author of a message after enrichment.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedUser {
    Directory(UserRecord),
    Synthetic(SyntheticUser),
    /// The referenced id (if the message named one) had no directory entry.
    Unresolved { referenced_id: Option<String> },
}

impl ResolvedUser {
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            ResolvedUser::Directory(user) => Some(user.id.0.as_str()),
            ResolvedUser::Synthetic(bot) => Some(bot.id.as_str()),
            ResolvedUser::Unresolved { referenced_id } => referenced_id.as_deref(),
        }
    }

    /// Real name, falling back to the username. `None` for unresolved authors.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        match self {
            ResolvedUser::Directory(user) => Some(user.display_name()),
            ResolvedUser::Synthetic(bot) => Some(bot.name.as_str()),
            ResolvedUser::Unresolved { .. } => None,
        }
    }

    #[must_use]
    pub fn avatar(&self) -> Option<&str> {
        let avatar = match self {
            ResolvedUser::Directory(user) => user
                .profile
                .as_ref()
                .and_then(|p| p.image_72.as_deref()),
            ResolvedUser::Synthetic(bot) => bot.avatar.as_deref(),
            ResolvedUser::Unresolved { .. } => None,
        };
        avatar.filter(|url| !url.is_empty())
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ResolvedUser::Unresolved { .. })
    }
}

impl UserRecord {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.real_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }
}

/// A message ready for rendering: author resolved, time formatted, text rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedMessage {
    pub message: RawMessage,
    pub user: ResolvedUser,
    pub time: String,
    pub text: String,
}
