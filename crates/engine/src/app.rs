//! Application state and composition.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::infrastructure::{
    config::AppConfig, ports::ScenarioRepo, provider_registry::ProviderRegistry,
    scenarios::FileScenarioRepo,
};
use crate::use_cases::TurnOrchestrator;

/// Main application state.
///
/// Passed to HTTP handlers via Axum state. Everything in here is shared,
/// immutable, and safe to use from any number of concurrent sessions.
pub struct App {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub scenarios: Arc<dyn ScenarioRepo>,
    /// Cancelled on server shutdown; sessions run on child tokens
    pub shutdown: CancellationToken,
}

impl App {
    pub fn new(
        orchestrator: Arc<TurnOrchestrator>,
        scenarios: Arc<dyn ScenarioRepo>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            scenarios,
            shutdown,
        }
    }

    /// Wire the production adapters from configuration.
    pub fn from_config(config: &AppConfig, shutdown: CancellationToken) -> Self {
        let providers = ProviderRegistry::from_config(config);
        tracing::info!(
            backends = ?providers.backends(),
            openai_configured = config.openai.api_key.is_some(),
            gemini_configured = config.gemini.api_key.is_some(),
            ollama_url = %config.ollama.base_url,
            "Providers registered"
        );

        let orchestrator = TurnOrchestrator::new(
            providers,
            config.session.clone(),
            Some(config.openai.reasoning_effort.clone()),
        );
        let scenarios = FileScenarioRepo::new(config.scenarios_dir.clone());
        tracing::info!(dir = %scenarios.root().display(), "Scenario catalogue");

        Self::new(Arc::new(orchestrator), Arc::new(scenarios), shutdown)
    }
}
