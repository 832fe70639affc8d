//! HTTP routes.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use roundtable_domain::{Scenario, ScenarioSummary};
use roundtable_shared::{ErrorResponse, MultiAgentRequest};
use std::sync::Arc;

use super::stream::{spawn_session, sse_response};
use crate::app::App;
use crate::infrastructure::ports::ScenarioRepoError;
use crate::use_cases::EventSink;

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/scenarios", get(list_scenarios))
        .route("/api/scenarios/{id}", get(get_scenario))
        .route(
            "/api/multi-agent",
            post(multi_agent).fallback(method_not_allowed),
        )
}

async fn health() -> &'static str {
    "OK"
}

async fn list_scenarios(
    State(app): State<Arc<App>>,
) -> Result<Json<Vec<ScenarioSummary>>, ApiError> {
    Ok(Json(app.scenarios.list().await?))
}

async fn get_scenario(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<Scenario>, ApiError> {
    Ok(Json(app.scenarios.get(&id).await?))
}

/// Start a multi-agent session and stream its events.
///
/// The body is parsed by hand so malformed JSON gets the same `{"error"}`
/// shape as validation failures.
async fn multi_agent(State(app): State<Arc<App>>, body: Bytes) -> Result<Response, ApiError> {
    let request: MultiAgentRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;

    let plan = app.orchestrator.validate(request).map_err(|e| {
        tracing::debug!(error = %e, "Rejected multi-agent request");
        ApiError::BadRequest(e.to_string())
    })?;

    let (sink, rx) = EventSink::channel(app.orchestrator.config().event_buffer);
    spawn_session(Arc::clone(&app), plan, sink);
    Ok(sse_response(rx))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    MethodNotAllowed,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

impl From<ScenarioRepoError> for ApiError {
    fn from(e: ScenarioRepoError) -> Self {
        match e {
            ScenarioRepoError::NotFound(_) => ApiError::NotFound(e.to_string()),
            ScenarioRepoError::InvalidId(_) => ApiError::BadRequest(e.to_string()),
            ScenarioRepoError::Io { .. } | ScenarioRepoError::Parse { .. } => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::SessionConfig;
    use crate::infrastructure::ports::{MockScenarioRepo, ProviderPort};
    use crate::infrastructure::provider_registry::ProviderRegistry;
    use crate::test_fixtures::{scenario_with, Script, ScriptedProvider};
    use crate::use_cases::TurnOrchestrator;
    use axum::{body::Body, http::Request as HttpRequest};
    use roundtable_domain::Backend;
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn app_with(provider: Arc<dyn ProviderPort>, scenarios: MockScenarioRepo) -> Router {
        let orchestrator = TurnOrchestrator::new(
            ProviderRegistry::new().with_provider(provider),
            SessionConfig::default(),
            None,
        );
        let app = App::new(
            Arc::new(orchestrator),
            Arc::new(scenarios),
            CancellationToken::new(),
        );
        routes().with_state(Arc::new(app))
    }

    fn app(scripts: Vec<Script>) -> Router {
        app_with(
            Arc::new(ScriptedProvider::new(Backend::Ollama, scripts)),
            MockScenarioRepo::new(),
        )
    }

    fn post_json(body: Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri("/api/multi-agent")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_get_multi_agent_is_405() {
        let request = HttpRequest::builder()
            .uri("/api/multi-agent")
            .body(Body::empty())
            .unwrap();
        let response = app(vec![]).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await, json!({"error": "Method not allowed"}));
    }

    #[tokio::test]
    async fn test_empty_npc_ids_is_400() {
        let request = post_json(json!({
            "backend": "local",
            "npcIds": [],
            "scenario": scenario_with(&["a"])
        }));
        let response = app(vec![]).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "npcIds required"}));
    }

    #[tokio::test]
    async fn test_unknown_backend_is_400() {
        let request = post_json(json!({
            "backend": "mystery",
            "npcIds": ["a"],
            "scenario": scenario_with(&["a"])
        }));
        let response = app(vec![]).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "backend must be one of: openai, gemini, ollama"})
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/multi-agent")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app(vec![]).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn test_session_streams_sse_frames() {
        let scripts = vec![Script::fragments(&[
            r#"{"utterance":"了解","#,
            r#""next_speaker":"a"}"#,
        ])];
        let request = post_json(json!({
            "backend": "local",
            "npcIds": ["a"],
            "rounds": 1,
            "context": [{"role": "user", "content": "hello"}],
            "scenario": scenario_with(&["a"])
        }));
        let response = app(scripts).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
        assert_eq!(
            response.headers()["cache-control"].to_str().unwrap(),
            "no-cache, no-transform"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let events: Vec<Value> = std::str::from_utf8(&body)
            .unwrap()
            .split("\n\n")
            .filter(|frame| !frame.is_empty())
            .map(|frame| serde_json::from_str(frame.strip_prefix("data: ").unwrap()).unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                json!({"type": "utterance", "agentId": "a", "name": "A", "delta": "了解"}),
                json!({"type": "structured", "agentId": "a", "name": "A", "utterance": "", "next_speaker": "a"}),
                json!({"type": "done"}),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_scenarios() {
        let mut scenarios = MockScenarioRepo::new();
        scenarios.expect_list().returning(|| {
            Ok(vec![ScenarioSummary {
                id: "flood".to_string(),
                title: "River flood".to_string(),
            }])
        });
        let router = app_with(
            Arc::new(ScriptedProvider::new(Backend::Ollama, vec![])),
            scenarios,
        );

        let request = HttpRequest::builder()
            .uri("/api/scenarios")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([{"id": "flood", "title": "River flood"}])
        );
    }

    #[tokio::test]
    async fn test_get_missing_scenario_is_404() {
        let mut scenarios = MockScenarioRepo::new();
        scenarios
            .expect_get()
            .returning(|id| Err(ScenarioRepoError::NotFound(id.to_string())));
        let router = app_with(
            Arc::new(ScriptedProvider::new(Backend::Ollama, vec![])),
            scenarios,
        );

        let request = HttpRequest::builder()
            .uri("/api/scenarios/nope")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Scenario not found: nope"})
        );
    }
}
