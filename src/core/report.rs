//! Run report - the ordered collection of per-step outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// Condition was false, or an earlier step failed; executor never invoked
    Skipped,
    /// Executor exited zero
    Succeeded,
    /// Executor exited non-zero, could not be invoked, or a secret was missing
    Failed,
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Trigger rejected the event; no step was executed
    Skipped,
    Succeeded,
    Failed,
}

/// Result of one step within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step name
    pub step_name: String,

    /// Outcome
    pub status: StepStatus,

    /// Exit code reported by the executor, when it was invoked and exited
    pub exit_code: Option<i32>,

    /// Why the step was skipped or how it failed
    pub reason: Option<String>,

    /// A failure with this set does not halt the run or fail it
    #[serde(default)]
    pub ignored: bool,
}

impl StepResult {
    pub fn skipped(step_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Skipped,
            exit_code: None,
            reason: Some(reason.into()),
            ignored: false,
        }
    }

    pub fn succeeded(step_name: impl Into<String>, exit_code: i32) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Succeeded,
            exit_code: Some(exit_code),
            reason: None,
            ignored: false,
        }
    }

    pub fn failed(
        step_name: impl Into<String>,
        exit_code: Option<i32>,
        reason: impl Into<String>,
        ignored: bool,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Failed,
            exit_code,
            reason: Some(reason.into()),
            ignored,
        }
    }
}

/// Report for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Overall outcome
    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Per-step outcomes, in declaration order
    pub results: Vec<StepResult>,
}

impl RunReport {
    /// Report for a run whose trigger rejected the event
    pub fn skipped_by_trigger(
        run_id: Uuid,
        pipeline_name: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            pipeline_name: pipeline_name.into(),
            status: RunStatus::Skipped,
            started_at,
            completed_at: Some(Utc::now()),
            results: Vec::new(),
        }
    }

    /// Conclude a run from its collected step results
    ///
    /// The run fails if any step failed and was not marked ignored.
    pub fn conclude(
        run_id: Uuid,
        pipeline_name: impl Into<String>,
        started_at: DateTime<Utc>,
        results: Vec<StepResult>,
    ) -> Self {
        let failed = results
            .iter()
            .any(|r| r.status == StepStatus::Failed && !r.ignored);
        Self {
            run_id,
            pipeline_name: pipeline_name.into(),
            status: if failed {
                RunStatus::Failed
            } else {
                RunStatus::Succeeded
            },
            started_at,
            completed_at: Some(Utc::now()),
            results,
        }
    }

    /// Result for a step by name
    pub fn result(&self, step_name: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step_name == step_name)
    }

    /// Counts of (succeeded, failed, skipped) steps
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut skipped = 0;
        for result in &self.results {
            match result.status {
                StepStatus::Succeeded => succeeded += 1,
                StepStatus::Failed => failed += 1,
                StepStatus::Skipped => skipped += 1,
            }
        }
        (succeeded, failed, skipped)
    }

    /// Wall-clock duration, when the run has finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conclude_all_succeeded() {
        let report = RunReport::conclude(
            Uuid::new_v4(),
            "release",
            Utc::now(),
            vec![
                StepResult::succeeded("build", 0),
                StepResult::skipped("publish", "condition not met"),
            ],
        );
        assert_eq!(report.status, RunStatus::Succeeded);
        assert_eq!(report.counts(), (1, 0, 1));
    }

    #[test]
    fn test_conclude_with_failure() {
        let report = RunReport::conclude(
            Uuid::new_v4(),
            "release",
            Utc::now(),
            vec![
                StepResult::failed("build", Some(2), "exited with code 2", false),
                StepResult::skipped("publish", "not reached"),
            ],
        );
        assert_eq!(report.status, RunStatus::Failed);
    }

    #[test]
    fn test_conclude_ignored_failure_does_not_fail_run() {
        let report = RunReport::conclude(
            Uuid::new_v4(),
            "release",
            Utc::now(),
            vec![
                StepResult::failed("lint", Some(1), "exited with code 1", true),
                StepResult::succeeded("build", 0),
            ],
        );
        assert_eq!(report.status, RunStatus::Succeeded);
    }

    #[test]
    fn test_skipped_by_trigger_has_no_results() {
        let report = RunReport::skipped_by_trigger(Uuid::new_v4(), "release", Utc::now());
        assert_eq!(report.status, RunStatus::Skipped);
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_result_lookup() {
        let report = RunReport::conclude(
            Uuid::new_v4(),
            "release",
            Utc::now(),
            vec![StepResult::succeeded("build", 0)],
        );
        assert_eq!(
            report.result("build").map(|r| r.status),
            Some(StepStatus::Succeeded)
        );
        assert!(report.result("publish").is_none());
    }
}
