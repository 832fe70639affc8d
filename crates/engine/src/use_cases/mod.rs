//! Use cases - User story orchestration.
//!
//! Use cases sit between the HTTP entry points and the infrastructure ports.

pub mod multi_agent;

pub use multi_agent::{EventSink, RequestError, SessionOutcome, SessionPlan, TurnOrchestrator};
