//! Backend -> provider lookup table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use roundtable_domain::Backend;

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::gemini::GeminiClient;
use crate::infrastructure::ollama::OllamaClient;
use crate::infrastructure::openai::OpenAiClient;
use crate::infrastructure::ports::ProviderPort;
use crate::infrastructure::resilient_provider::{ResilientProvider, RetryConfig};

/// Immutable map from backend to its adapter, shared by every request.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Backend, Arc<dyn ProviderPort>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own backend, replacing any previous one.
    pub fn with_provider(mut self, provider: Arc<dyn ProviderPort>) -> Self {
        self.providers.insert(provider.backend(), provider);
        self
    }

    /// All three backends, each wrapped in the retry layer.
    ///
    /// Backends lacking an API key are still registered; their calls fail
    /// with `NotConfigured`, which surfaces as a per-turn error.
    pub fn from_config(config: &AppConfig) -> Self {
        // No total timeout: streams may legitimately run for minutes.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.provider.connect_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        let retry = RetryConfig::from(&config.provider);

        let adapters: [Arc<dyn ProviderPort>; 3] = [
            Arc::new(OpenAiClient::new(client.clone(), &config.openai)),
            Arc::new(GeminiClient::new(client.clone(), &config.gemini)),
            Arc::new(OllamaClient::new(client, &config.ollama)),
        ];

        adapters.into_iter().fold(Self::new(), |registry, adapter| {
            registry.with_provider(Arc::new(ResilientProvider::new(adapter, retry.clone())))
        })
    }

    pub fn get(&self, backend: Backend) -> Option<Arc<dyn ProviderPort>> {
        self.providers.get(&backend).cloned()
    }

    pub fn backends(&self) -> Vec<Backend> {
        Backend::ALL
            .into_iter()
            .filter(|b| self.providers.contains_key(b))
            .collect()
    }
}
