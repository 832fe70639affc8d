//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod config;
pub mod gemini;
pub mod line_stream;
pub mod ollama;
pub mod openai;
pub mod ports;
pub mod provider_registry;
pub mod resilient_provider;
pub mod scenarios;
