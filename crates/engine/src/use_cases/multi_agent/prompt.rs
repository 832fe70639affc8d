//! Prompt assembly for one NPC turn.

use roundtable_domain::{ConversationEntry, Member, Scenario, SpeakerRoster};
use serde_json::{json, Value};

use crate::infrastructure::ports::{PromptMessage, PromptRole};

/// Build the ordered prompt for `npc`.
///
/// Four system messages (disclaimer, persona, behavior rules, knowledge JSON)
/// followed by the history this NPC is allowed to see: every user turn plus
/// its own earlier turns. Absent scenario fields yield empty system messages
/// so positions stay stable; adapters drop the empty ones.
pub fn assemble(
    npc: &Member,
    scenario: &Scenario,
    history: &[ConversationEntry],
) -> Vec<PromptMessage> {
    let mut messages = vec![
        PromptMessage::system(scenario.disclaimer_text()),
        PromptMessage::system(npc.persona_text()),
        PromptMessage::system(scenario.behavior_text()),
        PromptMessage::system(scenario.knowledge().to_string()),
    ];

    messages.extend(
        history
            .iter()
            .filter(|entry| entry.is_user() || entry.who.is_npc(&npc.id))
            .map(|entry| PromptMessage {
                role: if entry.is_user() {
                    PromptRole::User
                } else {
                    PromptRole::Assistant
                },
                who: Some(entry.who.clone()),
                content: entry.content.clone(),
            }),
    );

    messages
}

/// JSON schema of the `{utterance, next_speaker}` directive.
///
/// `next_speaker` is pinned to the roster through an anchored alternation of
/// the escaped member ids.
pub fn turn_schema(roster: &SpeakerRoster) -> Value {
    let alternatives = roster
        .ids()
        .iter()
        .map(|id| regex_lite::escape(id))
        .collect::<Vec<_>>()
        .join("|");

    json!({
        "type": "object",
        "properties": {
            "utterance": {
                "type": "string",
                "description": "What the character says in this turn, as natural spoken dialogue."
            },
            "next_speaker": {
                "type": "string",
                "description": "Id of the member who should speak next.",
                "pattern": format!("^({alternatives})$")
            }
        },
        "required": ["utterance", "next_speaker"],
        "additionalProperties": false
    })
}

/// System message telling the model to answer with exactly one directive.
pub fn turn_instruction(schema: &Value, roster: &SpeakerRoster) -> PromptMessage {
    PromptMessage::system(format!(
        "Reply with exactly one JSON object and nothing else: no code fences, no commentary. \
         Put what you say in this turn in \"utterance\" and the id of the member who should \
         speak next in \"next_speaker\" (one of: {}).\nJSON schema: {}",
        roster.ids().join(", "),
        schema
    ))
}
