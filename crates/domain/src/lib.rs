//! Roundtable Domain - core types shared by the engine and the wire protocol.
//!
//! - [`ConversationEntry`] - one immutable turn of the canonical history
//! - [`Scenario`] / [`Member`] - read-only scenario configuration
//! - [`TurnDirective`] - the validated `{utterance, next_speaker}` record
//! - [`Backend`] - the supported LLM providers

pub mod backend;
pub mod conversation;
pub mod directive;
pub mod error;
pub mod scenario;

pub use backend::Backend;
pub use conversation::{ConversationEntry, Role, Speaker};
pub use directive::TurnDirective;
pub use error::DomainError;
pub use scenario::{Member, Scenario, ScenarioSummary, SpeakerRoster};
