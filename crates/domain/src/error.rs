//! Unified error types for the domain layer
//!
//! Provides a common error type for conversation, scenario and directive
//! invariants, so adapters never need to fall back to `String` errors.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Parse error (for value objects)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    /// Creates a validation error for invariant violations.
    ///
    /// Use this when a value arrives with the right shape but breaks a rule:
    /// - Required fields are empty
    /// - A speaker id is not part of the scenario roster
    ///
    /// # Example
    /// ```ignore
    /// if utterance.trim().is_empty() {
    ///     return Err(DomainError::validation("utterance must not be empty"));
    /// }
    /// ```
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a parse error for string-to-type conversion failures.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
