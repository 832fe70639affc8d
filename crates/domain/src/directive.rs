//! The per-turn structured directive produced by a model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DomainError;
use crate::scenario::SpeakerRoster;

/// `{utterance, next_speaker}` as instructed per NPC turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnDirective {
    pub utterance: String,
    pub next_speaker: String,
}

impl TurnDirective {
    /// Validate a parsed JSON object against the directive schema.
    ///
    /// Unknown extra keys are ignored; both required fields must be strings,
    /// the utterance must contain text and `next_speaker` must be on the roster.
    pub fn from_value(value: &Value, roster: &SpeakerRoster) -> Result<Self, DomainError> {
        let object = value
            .as_object()
            .ok_or_else(|| DomainError::validation("turn directive must be a JSON object"))?;

        let utterance = required_string(object, "utterance")?;
        if utterance.trim().is_empty() {
            return Err(DomainError::validation("`utterance` must not be empty"));
        }

        let next_speaker = required_string(object, "next_speaker")?;
        if !roster.contains(next_speaker) {
            return Err(DomainError::validation(format!(
                "`next_speaker` \"{}\" is not a scenario member (expected one of: {})",
                next_speaker,
                roster.ids().join(", ")
            )));
        }

        Ok(Self {
            utterance: utterance.to_string(),
            next_speaker: next_speaker.to_string(),
        })
    }
}

fn required_string<'a>(
    object: &'a serde_json::Map<String, Value>,
    field: &str,
) -> Result<&'a str, DomainError> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(DomainError::validation(format!(
            "`{field}` must be a string, got {}",
            json_type(other)
        ))),
        None => Err(DomainError::validation(format!(
            "missing required field `{field}`"
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roster() -> SpeakerRoster {
        SpeakerRoster::new(["commander".to_string(), "drone".to_string()])
    }

    #[test]
    fn test_valid_directive() {
        let directive = TurnDirective::from_value(
            &json!({"utterance": "Report.", "next_speaker": "drone", "mood": "calm"}),
            &roster(),
        )
        .expect("directive should validate");
        assert_eq!(directive.next_speaker, "drone");
        assert_eq!(directive.utterance, "Report.");
    }

    #[test]
    fn test_unknown_speaker_is_rejected() {
        let err = TurnDirective::from_value(
            &json!({"utterance": "Report.", "next_speaker": "evac"}),
            &roster(),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("evac"));
        assert!(message.contains("commander, drone"));
    }

    #[test]
    fn test_wrong_types_and_missing_fields() {
        let err =
            TurnDirective::from_value(&json!({"utterance": 3, "next_speaker": "drone"}), &roster())
                .unwrap_err();
        assert!(err.to_string().contains("must be a string, got number"));

        let err = TurnDirective::from_value(&json!({"utterance": "hi"}), &roster()).unwrap_err();
        assert!(err.to_string().contains("missing required field `next_speaker`"));

        let err = TurnDirective::from_value(&json!(["hi"]), &roster()).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn test_blank_utterance_is_rejected() {
        let err = TurnDirective::from_value(
            &json!({"utterance": "  ", "next_speaker": "drone"}),
            &roster(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
