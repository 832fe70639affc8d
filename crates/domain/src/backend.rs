//! LLM backend identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A supported LLM provider.
///
/// Requests may name a backend by its canonical id or by its neutral alias
/// (`providerA`, `providerB`, `local`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Commercial chat API without a native system role.
    Gemini,
    /// Commercial chat API with JSON-schema structured output.
    OpenAi,
    /// Locally hosted inference server.
    Ollama,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::OpenAi, Backend::Gemini, Backend::Ollama];

    /// Canonical identifier used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gemini => "gemini",
            Backend::OpenAi => "openai",
            Backend::Ollama => "ollama",
        }
    }

    /// Comma separated list of canonical ids, for validation messages.
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(Backend::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gemini" | "providerA" => Ok(Backend::Gemini),
            "openai" | "providerB" => Ok(Backend::OpenAi),
            "ollama" | "local" => Ok(Backend::Ollama),
            other => Err(DomainError::parse(format!("unknown backend: {other}"))),
        }
    }
}
