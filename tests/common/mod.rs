//! Shared test utilities
#![allow(dead_code)]

use async_trait::async_trait;
use conductor::core::config::PipelineConfig;
use conductor::core::{EventKind, Pipeline, PipelineEvent, RunReport, StepStatus};
use conductor::execution::{
    ExecutorError, ExitStatus, PipelineRunner, StepExecutor, StepInvocation,
};
use conductor::secrets::MemorySecretStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Deterministic executor fake
///
/// Records every invocation and returns scripted exit codes (zero unless
/// overridden per step). Clone handles share state, so a test can keep one
/// handle for assertions while the runner owns another.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    exit_codes: Arc<Mutex<HashMap<String, i32>>>,
    invocations: Arc<Mutex<Vec<StepInvocation>>>,
}

impl FakeExecutor {
    /// Executor where every step exits zero
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Script an exit code for a step
    pub fn with_exit_code(self, step: &str, code: i32) -> Self {
        self.exit_codes
            .lock()
            .unwrap()
            .insert(step.to_string(), code);
        self
    }

    /// How many times the executor was invoked
    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    /// Step names in invocation order
    pub fn invoked_steps(&self) -> Vec<String> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .map(|i| i.step_name.clone())
            .collect()
    }

    /// The recorded invocation for a step, if it was invoked
    pub fn invocation_for(&self, step: &str) -> Option<StepInvocation> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.step_name == step)
            .cloned()
    }
}

#[async_trait]
impl StepExecutor for FakeExecutor {
    async fn execute(&self, invocation: &StepInvocation) -> Result<ExitStatus, ExecutorError> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let code = self
            .exit_codes
            .lock()
            .unwrap()
            .get(&invocation.step_name)
            .copied()
            .unwrap_or(0);
        Ok(ExitStatus::new(code))
    }
}

/// Load a pipeline from inline YAML
pub fn load_pipeline(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml)
        .expect("pipeline YAML should parse")
        .to_pipeline()
        .expect("pipeline should build")
}

/// Runner over the fake executor with no secrets configured
pub fn runner_with(executor: FakeExecutor) -> PipelineRunner<FakeExecutor> {
    PipelineRunner::new(executor, Arc::new(MemorySecretStore::new()))
}

/// Runner over the fake executor with the given secrets
pub fn runner_with_secrets(
    executor: FakeExecutor,
    secrets: MemorySecretStore,
) -> PipelineRunner<FakeExecutor> {
    PipelineRunner::new(executor, Arc::new(secrets))
}

/// A push event on the given branch
pub fn push_event(branch: &str) -> PipelineEvent {
    PipelineEvent::new(EventKind::Push, "acme/widgets", branch)
}

/// A tag event for the given tag (default branch context)
pub fn tag_event(tag: &str) -> PipelineEvent {
    PipelineEvent::new(EventKind::Tag, "acme/widgets", "master").with_tag(tag)
}

/// Assert a step's status in the report
pub fn assert_step_status(report: &RunReport, step: &str, status: StepStatus) {
    let result = report
        .result(step)
        .unwrap_or_else(|| panic!("no result for step `{}`", step));
    assert_eq!(
        result.status, status,
        "step `{}` should be {:?}, got {:?} (reason: {:?})",
        step, status, result.status, result.reason
    );
}

/// Assert the report lists results in exactly this order
pub fn assert_result_order(report: &RunReport, expected: &[&str]) {
    let actual: Vec<&str> = report.results.iter().map(|r| r.step_name.as_str()).collect();
    assert_eq!(actual, expected, "report order should match declaration");
}
