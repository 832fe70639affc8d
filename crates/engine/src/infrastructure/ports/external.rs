//! External service port traits (LLM providers).

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use roundtable_domain::{Backend, Speaker};

use super::error::{Capability, ProviderError};

// =============================================================================
// Prompt Types
// =============================================================================

/// Role of a provider-agnostic prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// A message in the assembled prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    /// Original speaker, kept for attribution
    pub who: Option<Speaker>,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            who: None,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            who: Some(Speaker::User),
            content: content.into(),
        }
    }

    pub fn assistant(who: Speaker, content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            who: Some(who),
            content: content.into(),
        }
    }

    /// Content prefixed with the speaker tag, unless the speaker is the user.
    pub fn attributed_content(&self) -> String {
        match &self.who {
            Some(Speaker::User) | None => self.content.clone(),
            Some(who) => format!("{who}: {}", self.content),
        }
    }
}

// =============================================================================
// Provider Types
// =============================================================================

/// A message in a provider's own vocabulary (role names, ordering).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: String,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// One self-contained provider invocation.
#[derive(Debug, Clone)]
pub struct ProviderCall {
    /// Overrides the adapter's configured model
    pub model: Option<String>,
    pub messages: Vec<ProviderMessage>,
    /// JSON schema of the turn directive, for providers with structured output
    pub schema: serde_json::Value,
    pub reasoning_effort: Option<String>,
}

/// Raw text fragments, yielded as soon as the provider sends them.
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

/// Uniform capability surface over the LLM backends.
///
/// Adapters own their wire protocol and read credentials from configuration;
/// nothing from the client request reaches them except the prompt and model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderPort: Send + Sync {
    fn backend(&self) -> Backend;

    /// Translate an assembled prompt into this provider's message shape.
    fn build_messages(&self, prompt: &[PromptMessage]) -> Vec<ProviderMessage>;

    fn supports_streaming(&self) -> bool {
        false
    }

    fn supports_sync(&self) -> bool {
        false
    }

    /// Open a streaming completion.
    async fn call_stream(&self, call: ProviderCall) -> Result<TextStream, ProviderError> {
        let _ = call;
        Err(ProviderError::unsupported(
            self.backend(),
            Capability::Streaming,
        ))
    }

    /// Fetch a complete response in one request.
    async fn call_sync(&self, call: ProviderCall) -> Result<String, ProviderError> {
        let _ = call;
        Err(ProviderError::unsupported(self.backend(), Capability::Sync))
    }
}
