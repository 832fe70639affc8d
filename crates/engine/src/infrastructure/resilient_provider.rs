//! Provider wrapper with exponential backoff retry
//!
//! Only *opening* a call is retried. Once a stream has handed out its first
//! fragment the text is already on its way to the client, so mid-stream
//! failures are returned as-is.

use async_trait::async_trait;
use rand::Rng;
use roundtable_domain::Backend;
use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::config::ProviderConfig;
use crate::infrastructure::ports::{
    PromptMessage, ProviderCall, ProviderError, ProviderMessage, ProviderPort, TextStream,
};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: u32,
    /// Base delay in milliseconds before first retry
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) applied around each delay
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            jitter_factor: 0.2,
        }
    }
}

impl From<&ProviderConfig> for RetryConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.retry_base_delay_ms,
            ..Self::default()
        }
    }
}

/// Wrapper that adds retry logic to any provider adapter
pub struct ResilientProvider {
    inner: Arc<dyn ProviderPort>,
    config: RetryConfig,
}

impl ResilientProvider {
    pub fn new(inner: Arc<dyn ProviderPort>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped, with jitter.
    fn calculate_delay(&self, attempt: u32) -> u64 {
        let base = self.config.base_delay_ms;
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.config.max_delay_ms);

        let jitter_range = (capped as f64 * self.config.jitter_factor) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        }
    }

    async fn execute_with_retry<T, F, Fut>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let backend = self.inner.backend();
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            attempt = attempt + 1,
                            %backend,
                            operation = operation_name,
                            "Provider call succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.calculate_delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay,
                        %backend,
                        error = %e,
                        operation = operation_name,
                        "Provider call failed, retrying..."
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => {
                    tracing::error!(
                        attempts = attempt + 1,
                        %backend,
                        error = %e,
                        operation = operation_name,
                        "Provider call failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl ProviderPort for ResilientProvider {
    fn backend(&self) -> Backend {
        self.inner.backend()
    }

    fn build_messages(&self, prompt: &[PromptMessage]) -> Vec<ProviderMessage> {
        self.inner.build_messages(prompt)
    }

    fn supports_streaming(&self) -> bool {
        self.inner.supports_streaming()
    }

    fn supports_sync(&self) -> bool {
        self.inner.supports_sync()
    }

    async fn call_stream(&self, call: ProviderCall) -> Result<TextStream, ProviderError> {
        let inner = Arc::clone(&self.inner);
        self.execute_with_retry("call_stream", || {
            let inner = Arc::clone(&inner);
            let call = call.clone();
            async move { inner.call_stream(call).await }
        })
        .await
    }

    async fn call_sync(&self, call: ProviderCall) -> Result<String, ProviderError> {
        let inner = Arc::clone(&self.inner);
        self.execute_with_retry("call_sync", || {
            let inner = Arc::clone(&inner);
            let call = call.clone();
            async move { inner.call_sync(call).await }
        })
        .await
    }
}
