//! Gemini `generateContent` client.
//!
//! Gemini has no system role in `contents`; system text is folded into the
//! leading user turn and assistant turns are sent as `model`. The API also
//! rejects two consecutive turns with the same role, so those are merged.

use async_trait::async_trait;
use reqwest::Client;
use roundtable_domain::Backend;
use serde::{Deserialize, Serialize};

use crate::infrastructure::config::GeminiConfig;
use crate::infrastructure::line_stream::{ensure_success, sse_data, text_stream, LineEvent};
use crate::infrastructure::ports::{
    PromptMessage, PromptRole, ProviderCall, ProviderError, ProviderMessage, ProviderPort,
    TextStream,
};

const BACKEND: Backend = Backend::Gemini;

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(client: Client, config: &GeminiConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    async fn post(&self, call: ProviderCall, method: &str) -> Result<reqwest::Response, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ProviderError::NotConfigured {
            backend: BACKEND,
            message: "GEMINI_API_KEY is not set".to_string(),
        })?;
        let model = call.model.unwrap_or_else(|| self.model.clone());
        let body = GenerateRequest {
            contents: call
                .messages
                .into_iter()
                .map(|m| Content {
                    role: m.role,
                    parts: vec![Part { text: m.content }],
                })
                .collect(),
        };
        tracing::debug!(model = %model, method, "Calling Gemini");

        let response = self
            .client
            .post(format!("{}/models/{}:{}", self.base_url, model, method))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(BACKEND, e))?;
        ensure_success(BACKEND, response).await
    }
}

#[async_trait]
impl ProviderPort for GeminiClient {
    fn backend(&self) -> Backend {
        BACKEND
    }

    fn build_messages(&self, prompt: &[PromptMessage]) -> Vec<ProviderMessage> {
        let system = prompt
            .iter()
            .filter(|m| m.role == PromptRole::System && !m.content.trim().is_empty())
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut messages: Vec<ProviderMessage> = Vec::new();
        if !system.is_empty() {
            messages.push(ProviderMessage::new("user", system));
        }
        for message in prompt.iter().filter(|m| m.role != PromptRole::System) {
            let role = match message.role {
                PromptRole::User => "user",
                _ => "model",
            };
            let content = message.attributed_content();
            match messages.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&content);
                }
                _ => messages.push(ProviderMessage::new(role, content)),
            }
        }
        messages
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn supports_sync(&self) -> bool {
        true
    }

    async fn call_stream(&self, call: ProviderCall) -> Result<TextStream, ProviderError> {
        let response = self.post(call, "streamGenerateContent?alt=sse").await?;
        Ok(text_stream(BACKEND, response.bytes_stream(), decode_line))
    }

    async fn call_sync(&self, call: ProviderCall) -> Result<String, ProviderError> {
        let response = self.post(call, "generateContent").await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(BACKEND, e))?;
        if let Some(error) = body.error {
            return Err(ProviderError::invalid_response(BACKEND, error.message));
        }
        let text = body.text();
        if text.is_empty() {
            return Err(ProviderError::EmptyBody { backend: BACKEND });
        }
        Ok(text)
    }
}

fn decode_line(line: &str) -> Result<LineEvent, ProviderError> {
    let Some(data) = sse_data(line) else {
        return Ok(LineEvent::Skip);
    };
    let chunk: GenerateResponse =
        serde_json::from_str(data).map_err(|e| ProviderError::invalid_response(BACKEND, e))?;
    if let Some(error) = chunk.error {
        return Err(ProviderError::invalid_response(BACKEND, error.message));
    }
    let text = chunk.text();
    Ok(if text.is_empty() {
        LineEvent::Skip
    } else {
        LineEvent::Text(text)
    })
}

// =============================================================================
// Gemini API types
// =============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

impl GenerateResponse {
    /// Text parts of the first candidate, concatenated.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
