//! Persistence layer for pipeline run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{RunReport, RunStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Run status
    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run completed (if complete)
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of succeeded steps
    pub succeeded_steps: usize,

    /// Number of failed steps
    pub failed_steps: usize,

    /// Number of skipped steps
    pub skipped_steps: usize,

    /// Total number of steps in the report
    pub total_steps: usize,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a pipeline run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs for a pipeline
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>>;

    /// List all pipeline names
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: tokio::sync::RwLock<std::collections::HashMap<Uuid, RunSummary>>,
    by_pipeline: tokio::sync::RwLock<std::collections::HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(std::collections::HashMap::new()),
            by_pipeline: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.insert(run.run_id, run.clone());

        let mut by_pipeline = self.by_pipeline.write().await;
        by_pipeline
            .entry(run.pipeline_name.clone())
            .or_insert_with(Vec::new)
            .push(run.run_id);

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_pipeline = self.by_pipeline.read().await;

        if let Some(ids) = by_pipeline.get(pipeline_name) {
            let mut result = Vec::new();
            for id in ids {
                if let Some(run) = runs.get(id) {
                    result.push(run.clone());
                }
            }
            Ok(result)
        } else {
            Ok(Vec::new())
        }
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let by_pipeline = self.by_pipeline.read().await;
        Ok(by_pipeline.keys().cloned().collect())
    }
}

/// Create a summary from a run report
pub fn create_summary(report: &RunReport) -> RunSummary {
    let (succeeded, failed, skipped) = report.counts();
    RunSummary {
        run_id: report.run_id,
        pipeline_name: report.pipeline_name.clone(),
        status: report.status,
        started_at: report.started_at,
        completed_at: report.completed_at,
        succeeded_steps: succeeded,
        failed_steps: failed,
        skipped_steps: skipped,
        total_steps: report.results.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepResult;

    fn summary(pipeline: &str) -> RunSummary {
        let report = RunReport::conclude(
            Uuid::new_v4(),
            pipeline,
            Utc::now(),
            vec![
                StepResult::succeeded("build", 0),
                StepResult::skipped("publish", "condition not met"),
            ],
        );
        create_summary(&report)
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryPersistence::new();
        let run = summary("release");
        store.save_run(&run).await.unwrap();

        let loaded = store.load_run(run.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.pipeline_name, "release");
        assert_eq!(loaded.succeeded_steps, 1);
        assert_eq!(loaded.skipped_steps, 1);
        assert_eq!(loaded.total_steps, 2);

        let runs = store.list_runs("release").await.unwrap();
        assert_eq!(runs.len(), 1);

        let pipelines = store.list_pipelines().await.unwrap();
        assert_eq!(pipelines, vec!["release".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_pipeline_lists_empty() {
        let store = InMemoryPersistence::new();
        assert!(store.list_runs("nope").await.unwrap().is_empty());
    }
}
