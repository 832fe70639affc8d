//! File-backed scenario catalogue.
//!
//! Layout: `<root>/<scenario id>/scenario.json`. The directory name is the id.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use roundtable_domain::{Scenario, ScenarioSummary};

use crate::infrastructure::ports::{ScenarioRepo, ScenarioRepoError};

const SCENARIO_FILE: &str = "scenario.json";

pub struct FileScenarioRepo {
    root: PathBuf,
}

impl FileScenarioRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scenario_path(&self, id: &str) -> Result<PathBuf, ScenarioRepoError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(ScenarioRepoError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(id).join(SCENARIO_FILE))
    }

    async fn summary_for(&self, dir: &Path, id: &str) -> Option<ScenarioSummary> {
        let path = dir.join(SCENARIO_FILE);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(scenario_id = %id, error = %e, "Skipping unreadable scenario");
                return None;
            }
        };
        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(scenario_id = %id, error = %e, "Skipping malformed scenario");
                return None;
            }
        };
        let title = value
            .get("title")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string());
        Some(ScenarioSummary {
            id: id.to_string(),
            title,
        })
    }
}

#[async_trait]
impl ScenarioRepo for FileScenarioRepo {
    async fn list(&self) -> Result<Vec<ScenarioSummary>, ScenarioRepoError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(root = %self.root.display(), "Scenario directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(ScenarioRepoError::Io {
                    id: self.root.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        let mut summaries = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(ScenarioRepoError::Io {
                        id: self.root.display().to_string(),
                        message: e.to_string(),
                    })
                }
            };
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            if let Some(summary) = self.summary_for(&entry.path(), &id).await {
                summaries.push(summary);
            }
        }

        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    async fn get(&self, id: &str) -> Result<Scenario, ScenarioRepoError> {
        let path = self.scenario_path(id)?;
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ScenarioRepoError::NotFound(id.to_string())
            } else {
                ScenarioRepoError::Io {
                    id: id.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let mut scenario: Scenario =
            serde_json::from_str(&raw).map_err(|e| ScenarioRepoError::Parse {
                id: id.to_string(),
                message: e.to_string(),
            })?;
        if scenario.id.is_empty() {
            scenario.id = id.to_string();
        }
        Ok(scenario)
    }
}
