//! OpenAI chat completions client with JSON-schema structured output.

use async_trait::async_trait;
use reqwest::Client;
use roundtable_domain::Backend;
use serde::{Deserialize, Serialize};

use crate::infrastructure::config::OpenAiConfig;
use crate::infrastructure::line_stream::{ensure_success, sse_data, text_stream, LineEvent};
use crate::infrastructure::ports::{
    PromptMessage, PromptRole, ProviderCall, ProviderError, ProviderMessage, ProviderPort,
    TextStream,
};

const BACKEND: Backend = Backend::OpenAi;

/// Name of the structured-output schema sent with every call.
pub const SCHEMA_NAME: &str = "NextTurnDirective";

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(client: Client, config: &OpenAiConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    async fn post(&self, call: ProviderCall, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ProviderError::NotConfigured {
            backend: BACKEND,
            message: "OPENAI_API_KEY is not set".to_string(),
        })?;

        let body = ChatRequest {
            model: call.model.unwrap_or_else(|| self.model.clone()),
            messages: call
                .messages
                .into_iter()
                .map(|m| ChatMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            response_format: ResponseFormat {
                r#type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: SCHEMA_NAME,
                    strict: true,
                    schema: call.schema,
                },
            },
            reasoning_effort: call.reasoning_effort,
            stream,
        };
        tracing::debug!(model = %body.model, stream, "Calling OpenAI chat completions");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(BACKEND, e))?;
        ensure_success(BACKEND, response).await
    }
}

#[async_trait]
impl ProviderPort for OpenAiClient {
    fn backend(&self) -> Backend {
        BACKEND
    }

    fn build_messages(&self, prompt: &[PromptMessage]) -> Vec<ProviderMessage> {
        prompt
            .iter()
            .filter_map(|m| match m.role {
                PromptRole::System if m.content.trim().is_empty() => None,
                PromptRole::System => Some(ProviderMessage::new("system", m.content.clone())),
                PromptRole::User => Some(ProviderMessage::new("user", m.attributed_content())),
                PromptRole::Assistant => {
                    Some(ProviderMessage::new("assistant", m.attributed_content()))
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
        let response = self.post(call, true).await?;
        Ok(text_stream(BACKEND, response.bytes_stream(), decode_line))
    }

    async fn call_sync(&self, call: ProviderCall) -> Result<String, ProviderError> {
        let response = self.post(call, false).await?;
        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(BACKEND, e))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or(ProviderError::EmptyBody { backend: BACKEND })
    }
}

fn decode_line(line: &str) -> Result<LineEvent, ProviderError> {
    let Some(data) = sse_data(line) else {
        return Ok(LineEvent::Skip);
    };
    if data == "[DONE]" {
        return Ok(LineEvent::End);
    }
    let chunk: ChatChunk =
        serde_json::from_str(data).map_err(|e| ProviderError::invalid_response(BACKEND, e))?;
    if let Some(error) = chunk.error {
        return Err(ProviderError::invalid_response(BACKEND, error.message));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .map_or(LineEvent::Skip, LineEvent::Text))
}

// =============================================================================
// OpenAI API types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    strict: bool,
    schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use futures_util::StreamExt;
    use roundtable_domain::Speaker;
    use serde_json::json;

    async fn stub_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub server");
        let addr = listener.local_addr().expect("stub address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new(Client::new(), &config(base_url, Some("sk-test")))
    }

    fn config(base_url: &str, api_key: Option<&str>) -> OpenAiConfig {
        OpenAiConfig {
            api_key: api_key.map(str::to_string),
            base_url: base_url.to_string(),
            model: "gpt-5-mini".to_string(),
            reasoning_effort: "low".to_string(),
        }
    }

    fn call() -> ProviderCall {
        ProviderCall {
            model: None,
            messages: vec![ProviderMessage::new("user", "hi")],
            schema: json!({"type": "object"}),
            reasoning_effort: Some("medium".to_string()),
        }
    }

    #[test]
    fn test_build_messages_keeps_roles() {
        let client = OpenAiClient::new(Client::new(), &config("http://localhost", None));
        let messages = client.build_messages(&[
            PromptMessage::system("rules"),
            PromptMessage::system("   "),
            PromptMessage::user("hello"),
            PromptMessage::assistant(Speaker::npc("safety"), "careful"),
        ]);
        assert_eq!(
            messages,
            vec![
                ProviderMessage::new("system", "rules"),
                ProviderMessage::new("user", "hello"),
                ProviderMessage::new("assistant", "npc:safety: careful"),
            ]
        );
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(
            decode_line(r#"data: {"choices":[{"delta":{"content":"{\"utt"}}]}"#),
            Ok(LineEvent::Text("{\"utt".to_string()))
        );
        assert_eq!(
            decode_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            Ok(LineEvent::Skip)
        );
        assert_eq!(decode_line("data: [DONE]"), Ok(LineEvent::End));
        assert_eq!(decode_line(": ping"), Ok(LineEvent::Skip));
        assert!(matches!(
            decode_line(r#"data: {"error":{"message":"quota exceeded"}}"#),
            Err(ProviderError::InvalidResponse { message, .. }) if message == "quota exceeded"
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_not_configured() {
        let client = OpenAiClient::new(Client::new(), &config("http://127.0.0.1:9", None));
        let result = client.call_stream(call()).await;
        assert!(matches!(result, Err(ProviderError::NotConfigured { .. })));
    }

    #[tokio::test]
    async fn test_call_stream_sends_schema_and_decodes_sse() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer sk-test")
                );
                assert_eq!(body["response_format"]["json_schema"]["name"], json!(SCHEMA_NAME));
                assert_eq!(body["response_format"]["json_schema"]["strict"], json!(true));
                assert_eq!(body["reasoning_effort"], json!("medium"));
                assert_eq!(body["stream"], json!(true));
                concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"he\"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n\n",
                    "data: [DONE]\n\n"
                )
            }),
        );
        let base = stub_server(router).await;

        let fragments: Vec<_> = client(&base)
            .call_stream(call())
            .await
            .expect("stream opens")
            .collect()
            .await;
        assert_eq!(fragments, vec![Ok("he".to_string()), Ok("llo".to_string())]);
    }

    #[tokio::test]
    async fn test_call_stream_reports_http_status() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limited") }),
        );
        let base = stub_server(router).await;

        let result = client(&base).call_stream(call()).await;
        assert!(matches!(
            result,
            Err(ProviderError::Status { status: 429, ref body, .. }) if body == "rate limited"
        ));
    }

    #[tokio::test]
    async fn test_in_stream_error_ends_stream() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"{\\\"u\"}}]}\n\n",
                    "data: {\"error\":{\"message\":\"server overloaded\"}}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n"
                )
            }),
        );
        let base = stub_server(router).await;

        let fragments: Vec<_> = client(&base)
            .call_stream(call())
            .await
            .expect("stream opens")
            .collect()
            .await;
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], Ok("{\"u".to_string()));
        assert!(matches!(
            &fragments[1],
            Err(ProviderError::InvalidResponse { message, .. }) if message == "server overloaded"
        ));
    }

    #[tokio::test]
    async fn test_call_sync_uses_model_override() {
        let router = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["stream"], json!(false));
                assert_eq!(body["response_format"]["type"], json!("json_schema"));
                let model = body["model"].as_str().unwrap_or_default().to_string();
                Json(json!({"choices": [{"message": {"role": "assistant", "content": format!("model={model}")}}]}))
            }),
        );
        let base = stub_server(router).await;

        let mut request = call();
        request.model = Some("gpt-5".to_string());
        let text = client(&base).call_sync(request).await.expect("sync call");
        assert_eq!(text, "model=gpt-5");
    }

    #[tokio::test]
    async fn test_call_sync_without_content_is_empty_body() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let base = stub_server(router).await;

        let result = client(&base).call_sync(call()).await;
        assert!(matches!(result, Err(ProviderError::EmptyBody { .. })));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let result = client("http://127.0.0.1:9").call_stream(call()).await;
        assert!(matches!(result, Err(ProviderError::Transport { .. })));
    }
}
