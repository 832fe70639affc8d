//! Roundtable Engine library.
//!
//! Server-side code for streaming multi-NPC conversations.
//!
//! ## Structure
//!
//! - `use_cases/` - Session orchestration, prompt assembly, turn parsing
//! - `infrastructure/` - Provider adapters, scenario storage, configuration
//! - `api/` - HTTP and SSE entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

/// Shared fixtures for unit tests.
#[cfg(test)]
pub mod test_fixtures;

pub use app::App;
