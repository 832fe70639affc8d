//! Server-sent events published on the multi-agent stream.

use serde::{Deserialize, Serialize};

/// One frame of the client-facing event stream.
///
/// Every stream that is still connected ends with exactly one
/// [`StreamEvent::Done`], and nothing follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// New utterance text for the NPC currently speaking
    Utterance {
        #[serde(rename = "agentId")]
        agent_id: String,
        name: String,
        delta: String,
    },
    /// End of a turn. `utterance` is always empty: the text already went out as deltas.
    Structured {
        #[serde(rename = "agentId")]
        agent_id: String,
        name: String,
        utterance: String,
        next_speaker: String,
    },
    /// A turn-scoped (or session-scoped, without agent) failure
    Error {
        #[serde(rename = "agentId", default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        message: String,
    },
    Done,
}

impl StreamEvent {
    pub fn utterance(
        agent_id: impl Into<String>,
        name: impl Into<String>,
        delta: impl Into<String>,
    ) -> Self {
        Self::Utterance {
            agent_id: agent_id.into(),
            name: name.into(),
            delta: delta.into(),
        }
    }

    pub fn structured(
        agent_id: impl Into<String>,
        name: impl Into<String>,
        next_speaker: impl Into<String>,
    ) -> Self {
        Self::Structured {
            agent_id: agent_id.into(),
            name: name.into(),
            utterance: String::new(),
            next_speaker: next_speaker.into(),
        }
    }

    /// Error scoped to one NPC's turn.
    pub fn turn_error(
        agent_id: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Error {
            agent_id: Some(agent_id.into()),
            name: Some(name.into()),
            message: message.into(),
        }
    }

    /// Error not tied to any NPC.
    pub fn session_error(message: impl Into<String>) -> Self {
        Self::Error {
            agent_id: None,
            name: None,
            message: message.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// The agent this event belongs to, if any.
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::Utterance { agent_id, .. } | Self::Structured { agent_id, .. } => Some(agent_id),
            Self::Error { agent_id, .. } => agent_id.as_deref(),
            Self::Done => None,
        }
    }

    /// Encode as one SSE frame: `data: <json>\n\n`.
    pub fn to_sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
