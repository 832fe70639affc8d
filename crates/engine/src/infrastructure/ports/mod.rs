//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - LLM calls (OpenAI, Gemini, Ollama - selected per request)
//! - Scenario storage (could swap the file catalogue for a database)

mod error;
mod external;
mod repos;

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{
    PromptMessage, PromptRole, ProviderCall, ProviderMessage, ProviderPort, TextStream,
};

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::ScenarioRepo;

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use external::MockProviderPort;
#[cfg(test)]
pub use repos::MockScenarioRepo;

// =============================================================================
// Error Types
// =============================================================================
pub use error::{Capability, ProviderError, ScenarioRepoError};
