//! SSE plumbing for multi-agent sessions.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{HeaderName, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use roundtable_shared::StreamEvent;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::app::App;
use crate::use_cases::{EventSink, SessionPlan};

/// Reported when the session task dies without finishing its stream.
pub const SESSION_ABORTED: &str = "internal error: session aborted";

/// Run a validated session in the background, feeding `sink`.
///
/// The orchestrator runs in its own task so that a panic inside it can still
/// be reported to the client, followed by the terminating `done`.
pub fn spawn_session(app: Arc<App>, plan: SessionPlan, sink: EventSink) {
    let span = tracing::info_span!("session", request_id = %Uuid::new_v4());
    tokio::spawn(
        async move {
            let orchestrator = Arc::clone(&app.orchestrator);
            let cancel = app.shutdown.child_token();
            let run_sink = sink.clone();
            let session = tokio::spawn(
                async move { orchestrator.run(plan, run_sink, cancel).await }.in_current_span(),
            );

            match session.await {
                Ok(outcome) => tracing::debug!(?outcome, "Session ended"),
                Err(e) => {
                    tracing::error!(error = %e, "Session task aborted");
                    let _ = sink.send(StreamEvent::session_error(SESSION_ABORTED)).await;
                    let _ = sink.send(StreamEvent::Done).await;
                }
            }
        }
        .instrument(span),
    );
}

/// `text/event-stream` response that forwards every event as one SSE frame.
///
/// The body ends once every sender is gone; dropping the body (client
/// disconnect) closes the channel, which the orchestrator observes.
pub fn sse_response(rx: mpsc::Receiver<StreamEvent>) -> Response {
    let frames = futures_util::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((event, rx))
    })
    .filter_map(|event| async move {
        match event.to_sse_frame() {
            Ok(frame) => Some(Ok::<_, Infallible>(frame)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode stream event");
                None
            }
        }
    });

    (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache, no-transform"),
            (CONNECTION, "keep-alive"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}
