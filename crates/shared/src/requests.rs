//! Request bodies accepted by the engine.

use std::collections::HashMap;

use roundtable_domain::{ConversationEntry, Role, Scenario, Speaker};
use serde::{Deserialize, Serialize};

/// Rounds run when the request does not say otherwise.
pub const DEFAULT_ROUNDS: u32 = 1;

/// Body of `POST /api/multi-agent`.
///
/// Everything is optional at the wire level so that missing fields surface
/// as validation messages instead of opaque deserialization failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiAgentRequest {
    /// Provider id or alias (`openai`, `gemini`, `ollama`, `providerA`, `providerB`, `local`)
    #[serde(default)]
    pub backend: Option<String>,
    /// NPCs to run, in speaking order
    #[serde(default)]
    pub npc_ids: Vec<String>,
    #[serde(default)]
    pub rounds: Option<u32>,
    /// Prior turns
    #[serde(default)]
    pub context: Vec<ContextEntryData>,
    #[serde(default)]
    pub scenario: Option<Scenario>,
    /// Provider-specific model identifier
    #[serde(default)]
    pub model: Option<String>,
    /// Use the provider's synchronous structured-output call instead of streaming
    #[serde(default)]
    pub structured: bool,
    /// Reasoning effort per NPC id (providers that do not support it ignore it)
    #[serde(default)]
    pub reasoning_efforts: HashMap<String, String>,
}

/// A prior turn as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntryData {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub who: Option<Speaker>,
}

impl From<ContextEntryData> for ConversationEntry {
    fn from(value: ContextEntryData) -> Self {
        ConversationEntry::new(value.role, value.who, value.content)
    }
}
