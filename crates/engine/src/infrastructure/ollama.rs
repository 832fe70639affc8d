//! Ollama client (native `/api/generate` endpoint)
//!
//! Ollama has no chat roles on this endpoint, so the prompt is flattened into
//! one text block: system messages first, then labelled conversation turns.
//! Structured output is requested through the `format` field.

use async_trait::async_trait;
use reqwest::Client;
use roundtable_domain::Backend;
use serde::{Deserialize, Serialize};

use crate::infrastructure::config::OllamaConfig;
use crate::infrastructure::line_stream::{ensure_success, text_stream, LineEvent};
use crate::infrastructure::ports::{
    PromptMessage, PromptRole, ProviderCall, ProviderError, ProviderMessage, ProviderPort,
    TextStream,
};

const BACKEND: Backend = Backend::Ollama;

/// Client for a locally hosted Ollama server
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(client: Client, config: &OllamaConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    fn request_body(&self, call: ProviderCall, stream: bool) -> GenerateRequest {
        GenerateRequest {
            model: call.model.unwrap_or_else(|| self.model.clone()),
            prompt: flatten_prompt(&call.messages),
            format: call.schema,
            stream,
        }
    }

    async fn post(&self, body: &GenerateRequest) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(BACKEND, e))?;
        ensure_success(BACKEND, response).await
    }
}

#[async_trait]
impl ProviderPort for OllamaClient {
    fn backend(&self) -> Backend {
        BACKEND
    }

    fn build_messages(&self, prompt: &[PromptMessage]) -> Vec<ProviderMessage> {
        prompt
            .iter()
            .filter(|m| !(m.role == PromptRole::System && m.content.trim().is_empty()))
            .map(|m| match m.role {
                PromptRole::System => ProviderMessage::new("system", m.content.clone()),
                PromptRole::User => ProviderMessage::new("user", m.attributed_content()),
                PromptRole::Assistant => {
                    ProviderMessage::new("assistant", m.attributed_content())
                }
            })
            .collect()
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn supports_sync(&self) -> bool {
        true
    }

    async fn call_stream(&self, call: ProviderCall) -> Result<TextStream, ProviderError> {
        let body = self.request_body(call, true);
        tracing::debug!(model = %body.model, prompt_len = body.prompt.len(), "Opening Ollama stream");
        let response = self.post(&body).await?;
        Ok(text_stream(BACKEND, response.bytes_stream(), decode_line))
    }

    async fn call_sync(&self, call: ProviderCall) -> Result<String, ProviderError> {
        let body = self.request_body(call, false);
        let response = self.post(&body).await?;
        let chunk: GenerateChunk = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(BACKEND, e))?;
        if let Some(error) = chunk.error {
            return Err(ProviderError::invalid_response(BACKEND, error));
        }
        match chunk.response {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(ProviderError::EmptyBody { backend: BACKEND }),
        }
    }
}

/// One prompt string: the system block, then `User:` / `Assistant:` turns.
fn flatten_prompt(messages: &[ProviderMessage]) -> String {
    let system = messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let conversation = messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| {
            let label = if m.role == "user" { "User" } else { "Assistant" };
            format!("{label}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    [system, conversation]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn decode_line(line: &str) -> Result<LineEvent, ProviderError> {
    let chunk: GenerateChunk =
        serde_json::from_str(line).map_err(|e| ProviderError::invalid_response(BACKEND, e))?;
    if let Some(error) = chunk.error {
        return Err(ProviderError::invalid_response(BACKEND, error));
    }
    match chunk.response {
        Some(text) if !text.is_empty() => Ok(LineEvent::Text(text)),
        _ if chunk.done => Ok(LineEvent::End),
        _ => Ok(LineEvent::Skip),
    }
}

// =============================================================================
// Ollama API types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    format: serde_json::Value,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}
