//! Test fixtures: scenario loaders and a scripted provider.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_fixtures::{scenario_with, Script, ScriptedProvider};
//!
//! let provider = Arc::new(ScriptedProvider::new(
//!     Backend::Ollama,
//!     vec![Script::fragments(&[r#"{"utterance":"hi","next_speaker":"a"}"#])],
//! ));
//! ```

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::StreamExt;
use roundtable_domain::{Backend, Member, Scenario};

use crate::infrastructure::ports::{
    PromptMessage, PromptRole, ProviderCall, ProviderError, ProviderMessage, ProviderPort,
    TextStream,
};

// =============================================================================
// Fixture Loading
// =============================================================================

/// Directory holding on-disk fixtures (`crates/engine/test_data`).
pub fn test_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_data")
}

/// Load a JSON fixture from the test_data/ directory.
///
/// # Panics
///
/// Panics if the fixture file cannot be read or parsed.
pub fn load_fixture<T: serde::de::DeserializeOwned>(path: &str) -> T {
    let fixture_path = test_data_dir().join(path);
    let content = std::fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture '{}': {}",
            fixture_path.display(),
            e
        )
    });
    serde_json::from_str(&content).unwrap_or_else(|e| {
        panic!(
            "Failed to parse fixture '{}': {}",
            fixture_path.display(),
            e
        )
    })
}

// =============================================================================
// Scenario Fixtures
// =============================================================================

/// The disaster-response meeting: `commander`, `safety`, `drone`.
pub fn commander_scenario() -> Scenario {
    load_fixture("scenarios/disaster-response/scenario.json")
}

/// Minimal scenario whose members are named after their upper-cased ids.
pub fn scenario_with(ids: &[&str]) -> Scenario {
    Scenario {
        id: "test".to_string(),
        members: ids
            .iter()
            .map(|id| Member::new(*id, id.to_uppercase()).with_persona(format!("You are {id}.")))
            .collect(),
        ..Default::default()
    }
}

// =============================================================================
// Scripted Provider
// =============================================================================

/// What the scripted provider does for one call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these fragments, then end
    Fragments(Vec<String>),
    /// Fail to open the call
    Fail(ProviderError),
    /// Stream these fragments, then yield the error
    FailAfter(Vec<String>, ProviderError),
    /// Open a stream that never yields
    Hang,
    /// Never answer the call at all
    NeverOpens,
    /// Answer a synchronous call
    Sync(String),
}

impl Script {
    pub fn fragments(parts: &[&str]) -> Self {
        Self::Fragments(parts.iter().map(|p| p.to_string()).collect())
    }
}

/// Provider that plays back one [`Script`] per call and records every call.
pub struct ScriptedProvider {
    backend: Backend,
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl ScriptedProvider {
    pub fn new(backend: Backend, scripts: Vec<Script>) -> Self {
        Self {
            backend,
            scripts: Mutex::new(scripts.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next_script(&self, call: ProviderCall) -> Script {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        self.scripts
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| Script::Fail(ProviderError::EmptyBody {
                backend: self.backend,
            }))
    }
}

#[async_trait]
impl ProviderPort for ScriptedProvider {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn build_messages(&self, prompt: &[PromptMessage]) -> Vec<ProviderMessage> {
        prompt
            .iter()
            .filter(|m| !(m.role == PromptRole::System && m.content.is_empty()))
            .map(|m| {
                let role = match m.role {
                    PromptRole::System => "system",
                    PromptRole::User => "user",
                    PromptRole::Assistant => "assistant",
                };
                ProviderMessage::new(role, m.attributed_content())
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
        match self.next_script(call) {
            Script::Fragments(parts) => {
                Ok(futures_util::stream::iter(parts.into_iter().map(Ok)).boxed())
            }
            Script::FailAfter(parts, error) => Ok(futures_util::stream::iter(
                parts
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error))),
            )
            .boxed()),
            Script::Hang => Ok(futures_util::stream::pending().boxed()),
            Script::NeverOpens => std::future::pending().await,
            Script::Fail(error) => Err(error),
            Script::Sync(text) => Ok(futures_util::stream::iter([Ok(text)]).boxed()),
        }
    }

    async fn call_sync(&self, call: ProviderCall) -> Result<String, ProviderError> {
        match self.next_script(call) {
            Script::Sync(text) => Ok(text),
            Script::Fragments(parts) => Ok(parts.concat()),
            Script::Fail(error) | Script::FailAfter(_, error) => Err(error),
            Script::Hang | Script::NeverOpens => std::future::pending().await,
        }
    }
}
