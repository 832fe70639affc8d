//! Multi-agent conversation use cases.
//!
//! - `prompt` - per-NPC prompt assembly and the turn schema
//! - `turn_parser` - incremental `{utterance, next_speaker}` parsing
//! - `orchestrator` - rounds x NPCs, republished as stream events
//! - `events` - the bounded event channel a session writes to

mod events;
mod orchestrator;
mod prompt;
mod turn_parser;

pub use events::{Disconnected, EventSink};
pub use orchestrator::{
    RequestError, SessionOutcome, SessionPlan, TurnOrchestrator, SESSION_CANCELLED,
};
pub use prompt::{assemble, turn_instruction, turn_schema};
pub use turn_parser::{ParserOutput, TurnParser, INCOMPLETE_DIRECTIVE};
