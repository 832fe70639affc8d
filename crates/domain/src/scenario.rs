//! Scenario and NPC member definitions.
//!
//! Scenarios are loaded per request and never mutated. Apart from the fields
//! the engine understands, a scenario carries arbitrary knowledge keys that
//! are handed to the model verbatim.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A conversational persona taking part in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Job title or function within the scenario
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Free-text instructions; never shared with other members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Chain-of-command metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<String>,
    /// Per-member model override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Member {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: None,
            persona: None,
            avatar: None,
            supervisor_id: None,
            model: None,
            extra: Map::new(),
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    /// Name shown to clients, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn persona_text(&self) -> &str {
        self.persona.as_deref().unwrap_or_default()
    }

    /// JSON form of this member without its persona.
    fn public_view(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.remove("persona");
        }
        value
    }
}

/// A role-play scenario: shared rules, knowledge and the member roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    #[serde(
        default,
        deserialize_with = "behavior_rules",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub behavior: Vec<String>,
    #[serde(default)]
    pub members: Vec<Member>,
    /// Every other scenario key
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Scenario {
    pub fn member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn disclaimer_text(&self) -> &str {
        self.disclaimer.as_deref().unwrap_or_default()
    }

    /// Behavior rules joined one per line.
    pub fn behavior_text(&self) -> String {
        self.behavior.join("\n")
    }

    /// The speaker universe for `next_speaker` validation.
    pub fn roster(&self) -> SpeakerRoster {
        SpeakerRoster::new(self.members.iter().map(|m| m.id.clone()))
    }

    /// Knowledge handed to every member: all scenario keys except
    /// `disclaimer` and `behavior`, with personas stripped from `members`.
    ///
    /// `serde_json::Map` keeps keys sorted, so the output is deterministic.
    pub fn knowledge(&self) -> Value {
        let mut knowledge = self.extra.clone();
        knowledge.insert("id".to_string(), Value::String(self.id.clone()));
        if let Some(title) = &self.title {
            knowledge.insert("title".to_string(), Value::String(title.clone()));
        }
        knowledge.insert(
            "members".to_string(),
            Value::Array(self.members.iter().map(Member::public_view).collect()),
        );
        Value::Object(knowledge)
    }

    pub fn summary(&self, fallback_id: &str) -> ScenarioSummary {
        let id = if self.id.is_empty() {
            fallback_id.to_string()
        } else {
            self.id.clone()
        };
        ScenarioSummary {
            title: self.title.clone().unwrap_or_else(|| id.clone()),
            id,
        }
    }
}

/// Catalogue entry for a stored scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub id: String,
    pub title: String,
}

/// Ordered set of member ids a turn may hand over to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerRoster {
    ids: Vec<String>,
}

impl SpeakerRoster {
    pub fn new(ids: impl IntoIterator<Item = String>) -> Self {
        let mut roster = Self::default();
        for id in ids {
            if !roster.ids.contains(&id) {
                roster.ids.push(id);
            }
        }
        roster
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Accepts `behavior` as a list of rules, a single string, or null.
fn behavior_rules<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Rules {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Rules>::deserialize(deserializer)? {
        Some(Rules::One(rule)) => vec![rule],
        Some(Rules::Many(rules)) => rules,
        None => Vec::new(),
    })
}
