//! Pipeline runner - evaluates gates and drives step execution

use crate::core::config::SettingValue;
use crate::core::{Pipeline, PipelineEvent, RunReport, RunStatus, Step, StepResult};
use crate::execution::executor::{ExecutorError, ExitStatus, StepExecutor, StepInvocation};
use crate::secrets::{SecretError, SecretProvider};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that occur during a pipeline run
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
    },
    RunSkipped {
        run_id: Uuid,
        pipeline_name: String,
    },
    StepStarted {
        step_name: String,
    },
    StepSkipped {
        step_name: String,
        reason: String,
    },
    StepSucceeded {
        step_name: String,
        exit_code: i32,
    },
    StepFailed {
        step_name: String,
        error: String,
        ignored: bool,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(RunnerEvent) + Send + Sync>;

/// Why a step failed before or during invocation
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Drives one pipeline run: trigger gate, per-step conditions, sequential
/// execution, fail-fast bookkeeping
///
/// The runner itself has no side effects beyond status aggregation; all
/// real work is delegated to the injected [`StepExecutor`], and secrets
/// come from the injected [`SecretProvider`].
pub struct PipelineRunner<E> {
    executor: Arc<E>,
    secrets: Arc<dyn SecretProvider>,
    event_handlers: Vec<EventHandler>,
}

impl<E: StepExecutor> PipelineRunner<E> {
    pub fn new(executor: E, secrets: Arc<dyn SecretProvider>) -> Self {
        Self {
            executor: Arc::new(executor),
            secrets,
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(RunnerEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    fn emit(&self, event: RunnerEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Execute the pipeline for one event
    ///
    /// Steps run strictly one at a time, in declaration order. A step
    /// whose condition is false is recorded `Skipped` and never invoked.
    /// After a non-ignored failure, remaining steps are recorded `Skipped`
    /// without being attempted.
    pub async fn run(&self, pipeline: &Pipeline, event: &PipelineEvent) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        if !pipeline.should_run(event) {
            info!(
                pipeline = %pipeline.name,
                git_ref = %event.git_ref(),
                "trigger rejected event, skipping run"
            );
            self.emit(RunnerEvent::RunSkipped {
                run_id,
                pipeline_name: pipeline.name.clone(),
            });
            return RunReport::skipped_by_trigger(run_id, &pipeline.name, started_at);
        }

        info!(pipeline = %pipeline.name, run_id = %run_id, "starting pipeline run");
        self.emit(RunnerEvent::RunStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
        });

        let mut results = Vec::with_capacity(pipeline.steps().len());
        let mut halted_by: Option<String> = None;

        for step in pipeline.steps() {
            if let Some(failed_step) = &halted_by {
                let reason = format!("not attempted: step `{}` failed", failed_step);
                self.emit(RunnerEvent::StepSkipped {
                    step_name: step.name.clone(),
                    reason: reason.clone(),
                });
                results.push(StepResult::skipped(&step.name, reason));
                continue;
            }

            if !step.condition.matches(event) {
                debug!(step = %step.name, "condition not met, skipping");
                self.emit(RunnerEvent::StepSkipped {
                    step_name: step.name.clone(),
                    reason: "condition not met".to_string(),
                });
                results.push(StepResult::skipped(&step.name, "condition not met"));
                continue;
            }

            info!(step = %step.name, image = %step.image, "executing step");
            self.emit(RunnerEvent::StepStarted {
                step_name: step.name.clone(),
            });

            match self.invoke(step, event).await {
                Ok(exit) if exit.success() => {
                    info!(step = %step.name, "step succeeded");
                    self.emit(RunnerEvent::StepSucceeded {
                        step_name: step.name.clone(),
                        exit_code: exit.code(),
                    });
                    results.push(StepResult::succeeded(&step.name, exit.code()));
                }
                Ok(exit) => {
                    let reason = format!("exited with code {}", exit.code());
                    self.record_failure(
                        step,
                        Some(exit.code()),
                        reason,
                        &mut results,
                        &mut halted_by,
                    );
                }
                Err(err) => {
                    self.record_failure(step, None, err.to_string(), &mut results, &mut halted_by);
                }
            }
        }

        let report = RunReport::conclude(run_id, &pipeline.name, started_at, results);
        info!(
            pipeline = %pipeline.name,
            run_id = %run_id,
            status = ?report.status,
            "pipeline run finished"
        );
        self.emit(RunnerEvent::RunCompleted {
            run_id,
            status: report.status,
        });
        report
    }

    fn record_failure(
        &self,
        step: &Step,
        exit_code: Option<i32>,
        reason: String,
        results: &mut Vec<StepResult>,
        halted_by: &mut Option<String>,
    ) {
        if step.ignore_failure {
            warn!(step = %step.name, %reason, "step failed, failure ignored");
        } else {
            error!(step = %step.name, %reason, "step failed, halting run");
            *halted_by = Some(step.name.clone());
        }
        self.emit(RunnerEvent::StepFailed {
            step_name: step.name.clone(),
            error: reason.clone(),
            ignored: step.ignore_failure,
        });
        results.push(StepResult::failed(
            &step.name,
            exit_code,
            reason,
            step.ignore_failure,
        ));
    }

    /// Resolve secrets, materialize the environment, and invoke the executor
    async fn invoke(&self, step: &Step, event: &PipelineEvent) -> Result<ExitStatus, StepError> {
        let invocation = self.build_invocation(step, event).await?;
        let exit = self.executor.execute(&invocation).await?;
        Ok(exit)
    }

    async fn build_invocation(
        &self,
        step: &Step,
        event: &PipelineEvent,
    ) -> Result<StepInvocation, SecretError> {
        let mut env = HashMap::new();
        env.insert("CI_REPO".to_string(), event.repo.clone());
        env.insert("CI_BRANCH".to_string(), event.branch.clone());
        env.insert("CI_EVENT".to_string(), event.kind.to_string());
        env.insert("CI_REF".to_string(), event.git_ref());
        if let Some(tag) = &event.tag {
            env.insert("CI_TAG".to_string(), tag.clone());
        }

        for (key, value) in &step.settings {
            let rendered = match value {
                SettingValue::Literal(v) => v.clone(),
                SettingValue::Secret { name } => {
                    debug!(step = %step.name, secret = %name, "resolving secret setting");
                    self.secrets.resolve(name).await?.expose().to_string()
                }
            };
            env.insert(setting_env_key(key), rendered);
        }

        Ok(StepInvocation {
            step_name: step.name.clone(),
            image: step.image.clone(),
            commands: step.commands.clone(),
            env,
            timeout: step.timeout,
        })
    }
}

/// Environment key a setting is exposed under: `dry_run` -> `PLUGIN_DRY_RUN`
fn setting_env_key(key: &str) -> String {
    let upper: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("PLUGIN_{}", upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PipelineConfig;
    use crate::core::{EventKind, StepStatus};
    use crate::secrets::MemorySecretStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Executor that records invocations and never fails
    #[derive(Default)]
    struct RecordingExecutor {
        invocations: Mutex<Vec<StepInvocation>>,
    }

    #[async_trait]
    impl StepExecutor for Arc<RecordingExecutor> {
        async fn execute(&self, invocation: &StepInvocation) -> Result<ExitStatus, ExecutorError> {
            self.invocations.lock().unwrap().push(invocation.clone());
            Ok(ExitStatus::new(0))
        }
    }

    fn pipeline_from(yaml: &str) -> Pipeline {
        PipelineConfig::from_yaml(yaml).unwrap().to_pipeline().unwrap()
    }

    #[tokio::test]
    async fn test_run_simple_pipeline() {
        let pipeline = pipeline_from(
            r#"
name: release
steps:
  - name: build
    image: builder
  - name: publish
    image: publisher
"#,
        );

        let executor = Arc::new(RecordingExecutor::default());
        let runner = PipelineRunner::new(executor.clone(), Arc::new(MemorySecretStore::new()));
        let event = PipelineEvent::new(EventKind::Push, "acme/widgets", "master");

        let report = runner.run(&pipeline, &event).await;
        assert_eq!(report.status, RunStatus::Succeeded);
        assert_eq!(executor.invocations.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_secret_settings_reach_executor_env() {
        let pipeline = pipeline_from(
            r#"
name: release
steps:
  - name: publish
    image: publisher
    settings:
      token:
        from_secret: registry_token
      dry_run: true
"#,
        );

        let mut secrets = MemorySecretStore::new();
        secrets.insert("registry_token", "hunter2");

        let executor = Arc::new(RecordingExecutor::default());
        let runner = PipelineRunner::new(executor.clone(), Arc::new(secrets));
        let event = PipelineEvent::new(EventKind::Push, "acme/widgets", "master");

        let report = runner.run(&pipeline, &event).await;
        assert_eq!(report.status, RunStatus::Succeeded);

        let invocations = executor.invocations.lock().unwrap();
        let env = &invocations[0].env;
        assert_eq!(env.get("PLUGIN_TOKEN"), Some(&"hunter2".to_string()));
        assert_eq!(env.get("PLUGIN_DRY_RUN"), Some(&"true".to_string()));
        assert_eq!(env.get("CI_BRANCH"), Some(&"master".to_string()));
        assert_eq!(env.get("CI_REF"), Some(&"refs/heads/master".to_string()));
    }

    #[tokio::test]
    async fn test_missing_secret_fails_step_before_invocation() {
        let pipeline = pipeline_from(
            r#"
name: release
steps:
  - name: publish
    image: publisher
    settings:
      token:
        from_secret: registry_token
  - name: notify
    image: webhook
"#,
        );

        let executor = Arc::new(RecordingExecutor::default());
        let runner = PipelineRunner::new(executor.clone(), Arc::new(MemorySecretStore::new()));
        let event = PipelineEvent::new(EventKind::Push, "acme/widgets", "master");

        let report = runner.run(&pipeline, &event).await;
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(executor.invocations.lock().unwrap().len(), 0);

        let publish = report.result("publish").unwrap();
        assert_eq!(publish.status, StepStatus::Failed);
        assert!(publish.reason.as_ref().unwrap().contains("registry_token"));

        let notify = report.result("notify").unwrap();
        assert_eq!(notify.status, StepStatus::Skipped);
    }

    #[test]
    fn test_setting_env_key() {
        assert_eq!(setting_env_key("dry_run"), "PLUGIN_DRY_RUN");
        assert_eq!(setting_env_key("registry-url"), "PLUGIN_REGISTRY_URL");
        assert_eq!(setting_env_key("token"), "PLUGIN_TOKEN");
    }
}
