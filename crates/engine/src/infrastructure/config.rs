//! Application configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address for the HTTP server
    pub server_host: String,
    pub server_port: u16,

    /// CORS allowed origins (comma-separated, or "*" for any)
    pub cors_allowed_origins: Vec<String>,

    /// Root of the scenario catalogue (one sub-directory per scenario)
    pub scenarios_dir: PathBuf,

    pub openai: OpenAiConfig,
    pub gemini: GeminiConfig,
    pub ollama: OllamaConfig,
    pub provider: ProviderConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Missing key leaves the backend registered but failing per turn
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Default `reasoning_effort` when the request names none for an NPC
    pub reasoning_effort: String,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

/// Outbound provider call settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub connect_timeout_secs: u64,
    /// Retries after the first failed attempt to open a call
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

/// Per-request orchestration limits
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Longest silence tolerated between two fragments of one turn
    pub turn_idle_timeout_secs: u64,
    pub max_rounds: u32,
    /// Capacity of the event channel between orchestrator and response body
    pub event_buffer: usize,
}

impl SessionConfig {
    pub fn turn_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_idle_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_idle_timeout_secs: 60,
            max_rounds: 10,
            event_buffer: 64,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            scenarios_dir: env::var("SCENARIOS_DIR")
                .unwrap_or_else(|_| "./scenarios".to_string())
                .into(),

            openai: OpenAiConfig {
                api_key: non_empty_var("OPENAI_API_KEY"),
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-5-mini".to_string()),
                reasoning_effort: env::var("OPENAI_REASONING_EFFORT")
                    .unwrap_or_else(|_| "low".to_string()),
            },

            gemini: GeminiConfig {
                api_key: non_empty_var("GEMINI_API_KEY"),
                base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }),
                model: env::var("GEMINI_MODEL")
                    .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            },

            ollama: OllamaConfig {
                base_url: env::var("OLLAMA_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string()),
                model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "gemma3:4b".to_string()),
            },

            provider: ProviderConfig {
                connect_timeout_secs: env::var("PROVIDER_CONNECT_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                max_retries: env::var("PROVIDER_MAX_RETRIES")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                retry_base_delay_ms: env::var("PROVIDER_RETRY_BASE_DELAY_MS")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .unwrap_or(500),
            },

            session: SessionConfig {
                turn_idle_timeout_secs: env::var("TURN_IDLE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
                max_rounds: env::var("MAX_ROUNDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                event_buffer: env::var("EVENT_BUFFER")
                    .unwrap_or_else(|_| "64".to_string())
                    .parse()
                    .ok()
                    .filter(|n: &usize| *n > 0)
                    .unwrap_or(64),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
