//! Multi-NPC turn orchestration.
//!
//! For every round, each requested NPC speaks once, strictly in order. A turn
//! is: assemble the prompt, call the provider, run the fragments through the
//! [`TurnParser`], and republish what comes out as [`StreamEvent`]s tagged
//! with the NPC. Turn failures are reported and the session moves on; the
//! stream always ends with a single `done` unless the client left.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use roundtable_domain::{Backend, ConversationEntry, Scenario, SpeakerRoster, TurnDirective};
use roundtable_shared::{MultiAgentRequest, StreamEvent, DEFAULT_ROUNDS};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::events::EventSink;
use super::prompt::{assemble, turn_instruction, turn_schema};
use super::turn_parser::{ParserOutput, TurnParser, INCOMPLETE_DIRECTIVE};
use crate::infrastructure::config::SessionConfig;
use crate::infrastructure::ports::{Capability, ProviderCall, ProviderError, ProviderPort};
use crate::infrastructure::provider_registry::ProviderRegistry;

/// Message of the session-scoped error emitted on server shutdown.
pub const SESSION_CANCELLED: &str = "session cancelled";

// =============================================================================
// Request validation
// =============================================================================

/// Rejections raised before any event is streamed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("backend must be one of: {}", Backend::supported_list())]
    InvalidBackend,

    #[error("npcIds required")]
    MissingNpcIds,

    #[error("scenario required")]
    MissingScenario,

    #[error("rounds must be between 1 and {max}")]
    InvalidRounds { max: u32 },

    #[error("backend {0} is not available")]
    BackendUnavailable(Backend),
}

/// A validated request, ready to run.
pub struct SessionPlan {
    pub backend: Backend,
    pub provider: Arc<dyn ProviderPort>,
    pub npc_ids: Vec<String>,
    pub rounds: u32,
    pub history: Vec<ConversationEntry>,
    pub scenario: Scenario,
    pub model: Option<String>,
    pub structured: bool,
    pub reasoning_efforts: HashMap<String, String>,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// All turns ran; `done` was delivered
    Completed { completed_turns: usize, failed_turns: usize },
    /// The client dropped the stream; no `done` was sent
    Disconnected,
    /// Server shutdown; an error and `done` were sent
    Cancelled,
}

/// Result of a single NPC turn.
enum TurnResult {
    Completed(TurnDirective),
    Failed(String),
    Disconnected,
    Cancelled,
}

/// Identity an NPC's events are tagged with.
struct NpcTag<'a> {
    id: &'a str,
    name: &'a str,
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct TurnOrchestrator {
    providers: ProviderRegistry,
    config: SessionConfig,
    /// Used for NPCs the request gives no reasoning effort for
    default_reasoning_effort: Option<String>,
}

impl TurnOrchestrator {
    pub fn new(
        providers: ProviderRegistry,
        config: SessionConfig,
        default_reasoning_effort: Option<String>,
    ) -> Self {
        Self {
            providers,
            config,
            default_reasoning_effort,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Check a request and resolve its provider.
    pub fn validate(&self, request: MultiAgentRequest) -> Result<SessionPlan, RequestError> {
        let backend: Backend = request
            .backend
            .as_deref()
            .and_then(|b| b.parse().ok())
            .ok_or(RequestError::InvalidBackend)?;

        if request.npc_ids.is_empty() {
            return Err(RequestError::MissingNpcIds);
        }

        let scenario = request.scenario.ok_or(RequestError::MissingScenario)?;

        let rounds = request.rounds.unwrap_or(DEFAULT_ROUNDS);
        if rounds == 0 || rounds > self.config.max_rounds {
            return Err(RequestError::InvalidRounds {
                max: self.config.max_rounds,
            });
        }

        let provider = self
            .providers
            .get(backend)
            .ok_or(RequestError::BackendUnavailable(backend))?;

        Ok(SessionPlan {
            backend,
            provider,
            npc_ids: request.npc_ids,
            rounds,
            history: request.context.into_iter().map(Into::into).collect(),
            scenario,
            model: request.model,
            structured: request.structured,
            reasoning_efforts: request.reasoning_efforts,
        })
    }

    /// Run every turn of `plan`, publishing events to `sink`.
    pub async fn run(
        &self,
        plan: SessionPlan,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> SessionOutcome {
        let SessionPlan {
            backend,
            provider,
            npc_ids,
            rounds,
            mut history,
            scenario,
            model,
            structured,
            reasoning_efforts,
        } = plan;

        let roster = scenario.roster();
        let schema = turn_schema(&roster);
        let mut completed_turns = 0;
        let mut failed_turns = 0;

        tracing::info!(%backend, rounds, npcs = npc_ids.len(), structured, "Session started");

        for round in 1..=rounds {
            for npc_id in &npc_ids {
                let Some(npc) = scenario.member(npc_id) else {
                    tracing::debug!(npc_id = %npc_id, "Skipping NPC not in scenario");
                    continue;
                };

                if cancel.is_cancelled() {
                    return self.cancelled(&sink).await;
                }

                let mut prompt = vec![turn_instruction(&schema, &roster)];
                prompt.extend(assemble(npc, &scenario, &history));
                let call = ProviderCall {
                    model: npc.model.clone().or_else(|| model.clone()),
                    messages: provider.build_messages(&prompt),
                    schema: schema.clone(),
                    reasoning_effort: reasoning_efforts
                        .get(npc_id)
                        .cloned()
                        .or_else(|| self.default_reasoning_effort.clone()),
                };

                let speaker = NpcTag {
                    id: &npc.id,
                    name: npc.display_name(),
                };
                let span = tracing::info_span!("turn", npc_id = %npc.id, round);
                let result = if structured {
                    self.sync_turn(provider.as_ref(), call, &speaker, &roster, &sink, &cancel)
                        .instrument(span)
                        .await
                } else {
                    self.streaming_turn(provider.as_ref(), call, &speaker, &roster, &sink, &cancel)
                        .instrument(span)
                        .await
                };

                match result {
                    TurnResult::Completed(directive) => {
                        tracing::debug!(
                            npc_id = %npc.id,
                            round,
                            next_speaker = %directive.next_speaker,
                            "Turn completed"
                        );
                        history.push(ConversationEntry::npc(&npc.id, directive.utterance));
                        completed_turns += 1;
                    }
                    TurnResult::Failed(message) => {
                        tracing::warn!(npc_id = %npc.id, round, error = %message, "Turn failed");
                        failed_turns += 1;
                        let event = StreamEvent::turn_error(&npc.id, npc.display_name(), message);
                        if sink.send(event).await.is_err() {
                            return disconnected();
                        }
                    }
                    TurnResult::Disconnected => return disconnected(),
                    TurnResult::Cancelled => return self.cancelled(&sink).await,
                }
            }
        }

        if sink.send(StreamEvent::Done).await.is_err() {
            return disconnected();
        }
        tracing::info!(completed_turns, failed_turns, "Session finished");
        SessionOutcome::Completed {
            completed_turns,
            failed_turns,
        }
    }

    async fn streaming_turn(
        &self,
        provider: &dyn ProviderPort,
        call: ProviderCall,
        speaker: &NpcTag<'_>,
        roster: &SpeakerRoster,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> TurnResult {
        if !provider.supports_streaming() {
            return TurnResult::Failed(
                ProviderError::unsupported(provider.backend(), Capability::Streaming).to_string(),
            );
        }

        // Opening (retries included) counts against the same idle budget.
        let idle = self.config.turn_idle_timeout();
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TurnResult::Cancelled,
            _ = sink.closed() => return TurnResult::Disconnected,
            opened = tokio::time::timeout(idle, provider.call_stream(call)) => opened,
        };
        let mut stream = match opened {
            Err(_) => return TurnResult::Failed(idle_message(provider.backend(), idle)),
            Ok(Err(e)) => return TurnResult::Failed(e.to_string()),
            Ok(Ok(stream)) => stream,
        };

        let mut parser = TurnParser::new(roster.clone());
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TurnResult::Cancelled,
                _ = sink.closed() => return TurnResult::Disconnected,
                next = tokio::time::timeout(idle, stream.next()) => next,
            };

            let outputs = match next {
                Err(_) => return TurnResult::Failed(idle_message(provider.backend(), idle)),
                Ok(Some(Err(e))) => return TurnResult::Failed(e.to_string()),
                Ok(Some(Ok(fragment))) => parser.push(&fragment),
                Ok(None) => {
                    let outputs = parser.finish();
                    return match publish(outputs, speaker, sink).await {
                        Some(result) => result,
                        None => TurnResult::Failed(INCOMPLETE_DIRECTIVE.to_string()),
                    };
                }
            };

            // Returning drops the provider stream and releases the connection.
            if let Some(result) = publish(outputs, speaker, sink).await {
                return result;
            }
        }
    }

    async fn sync_turn(
        &self,
        provider: &dyn ProviderPort,
        call: ProviderCall,
        speaker: &NpcTag<'_>,
        roster: &SpeakerRoster,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> TurnResult {
        if !provider.supports_sync() {
            return TurnResult::Failed(
                ProviderError::unsupported(provider.backend(), Capability::Sync).to_string(),
            );
        }

        let idle = self.config.turn_idle_timeout();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TurnResult::Cancelled,
            _ = sink.closed() => return TurnResult::Disconnected,
            response = tokio::time::timeout(idle, provider.call_sync(call)) => response,
        };
        let text = match response {
            Err(_) => return TurnResult::Failed(idle_message(provider.backend(), idle)),
            Ok(Err(e)) => return TurnResult::Failed(e.to_string()),
            Ok(Ok(text)) => text,
        };

        let mut parser = TurnParser::new(roster.clone());
        let mut outputs = parser.push(&text);
        if !outputs
            .iter()
            .any(|o| matches!(o, ParserOutput::Completed(_) | ParserOutput::Invalid(_)))
        {
            outputs.extend(parser.finish());
        }
        publish(outputs, speaker, sink)
            .await
            .unwrap_or_else(|| TurnResult::Failed(INCOMPLETE_DIRECTIVE.to_string()))
    }

    async fn cancelled(&self, sink: &EventSink) -> SessionOutcome {
        tracing::info!("Session cancelled by shutdown");
        let _ = sink.send(StreamEvent::session_error(SESSION_CANCELLED)).await;
        let _ = sink.send(StreamEvent::Done).await;
        SessionOutcome::Cancelled
    }
}

/// Forward parser outputs as events. Returns a result once the turn is over.
async fn publish(
    outputs: Vec<ParserOutput>,
    speaker: &NpcTag<'_>,
    sink: &EventSink,
) -> Option<TurnResult> {
    for output in outputs {
        match output {
            ParserOutput::Delta(delta) => {
                let event = StreamEvent::utterance(speaker.id, speaker.name, delta);
                if sink.send(event).await.is_err() {
                    return Some(TurnResult::Disconnected);
                }
            }
            ParserOutput::Completed(directive) => {
                let event =
                    StreamEvent::structured(speaker.id, speaker.name, &directive.next_speaker);
                if sink.send(event).await.is_err() {
                    return Some(TurnResult::Disconnected);
                }
                return Some(TurnResult::Completed(directive));
            }
            ParserOutput::Invalid(detail) => return Some(TurnResult::Failed(detail)),
        }
    }
    None
}

fn idle_message(backend: Backend, idle: Duration) -> String {
    format!("{backend} sent nothing for {}s", idle.as_secs())
}

fn disconnected() -> SessionOutcome {
    tracing::info!("Client disconnected, abandoning session");
    SessionOutcome::Disconnected
}
