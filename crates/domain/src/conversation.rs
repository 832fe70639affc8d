//! Conversation history entries.
//!
//! The history is an ordered list of [`ConversationEntry`] values supplied by
//! the client per request. Entries are never edited once appended.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    /// Any role label we do not recognize. Treated like `assistant` by prompts.
    #[serde(other)]
    Unknown,
}

/// Who produced an entry.
///
/// Wire form is a plain string: `user`, `system`, `npc:<id>` or any other label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Speaker {
    User,
    System,
    Npc(String),
    Other(String),
}

impl Speaker {
    pub fn npc(id: impl Into<String>) -> Self {
        Self::Npc(id.into())
    }

    /// Default speaker for entries that arrive without a `who` tag.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::User => Speaker::User,
            Role::System => Speaker::System,
            Role::Assistant | Role::Unknown => Speaker::Other("assistant".to_string()),
        }
    }

    /// Returns true if this speaker is the NPC with the given id.
    pub fn is_npc(&self, npc_id: &str) -> bool {
        matches!(self, Speaker::Npc(id) if id == npc_id)
    }
}

impl From<String> for Speaker {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Speaker::User,
            "system" => Speaker::System,
            _ => match value.strip_prefix("npc:") {
                Some(id) => Speaker::Npc(id.to_string()),
                None => Speaker::Other(value),
            },
        }
    }
}

impl From<Speaker> for String {
    fn from(value: Speaker) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => f.write_str("user"),
            Speaker::System => f.write_str("system"),
            Speaker::Npc(id) => write!(f, "npc:{id}"),
            Speaker::Other(label) => f.write_str(label),
        }
    }
}

/// One turn of the canonical conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub who: Speaker,
    pub content: String,
}

impl ConversationEntry {
    /// Build an entry, deriving `who` from the role when the client omitted it.
    pub fn new(role: Role, who: Option<Speaker>, content: impl Into<String>) -> Self {
        Self {
            role,
            who: who.unwrap_or_else(|| Speaker::for_role(role)),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Some(Speaker::User), content)
    }

    /// A completed NPC turn.
    pub fn npc(npc_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Some(Speaker::npc(npc_id)), content)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
