//! Roundtable Shared - wire types between the engine and its clients
//!
//! - [`requests`] - the multi-agent request body
//! - [`messages`] - server-sent stream events and their SSE framing
//! - [`responses`] - JSON error bodies for rejected requests
//!
//! # Design Principles
//!
//! 1. **No business logic** - pure data types and serialization
//! 2. **Wire-exact** - field names match what browser clients already parse

pub mod messages;
pub mod requests;
pub mod responses;

pub use messages::StreamEvent;
pub use requests::{ContextEntryData, MultiAgentRequest, DEFAULT_ROUNDS};
pub use responses::ErrorResponse;
