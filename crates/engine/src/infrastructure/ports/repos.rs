//! Storage port traits.

use async_trait::async_trait;
use roundtable_domain::{Scenario, ScenarioSummary};

use super::error::ScenarioRepoError;

/// Read-only scenario catalogue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScenarioRepo: Send + Sync {
    /// All readable scenarios, sorted by id.
    async fn list(&self) -> Result<Vec<ScenarioSummary>, ScenarioRepoError>;

    async fn get(&self, id: &str) -> Result<Scenario, ScenarioRepoError>;
}
