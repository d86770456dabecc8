//! Pipeline domain model

use crate::core::config::{ConfigError, PipelineConfig};
use crate::core::event::PipelineEvent;
use crate::core::predicate::Predicate;
use crate::core::step::{Step, StepDefaults};

/// A pipeline definition
///
/// Loaded once from configuration; read-only for the duration of a run.
/// Steps execute in declaration order.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Predicate gating whether the pipeline runs at all for an event
    pub trigger: Predicate,

    steps: Vec<Step>,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let defaults = StepDefaults {
            timeout_secs: config
                .default_timeout_secs
                .unwrap_or_else(|| StepDefaults::default().timeout_secs),
        };

        let steps = config
            .steps
            .iter()
            .map(|step_config| Step::from_config(step_config, &defaults))
            .collect::<Result<Vec<_>, _>>()?;

        let trigger = match &config.trigger {
            Some(trigger) => trigger.compile().map_err(ConfigError::Trigger)?,
            None => Predicate::Always,
        };

        Ok(Pipeline {
            name: config.name.clone(),
            trigger,
            steps,
        })
    }

    /// Steps in declaration order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Whether the pipeline runs at all for the given event
    pub fn should_run(&self, event: &PipelineEvent) -> bool {
        self.trigger.matches(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::EventKind;

    #[test]
    fn test_steps_keep_declaration_order() {
        let yaml = r#"
name: release
steps:
  - name: bump
    image: plugins/semantic-release
  - name: push
    image: plugins/git-push
  - name: build
    image: plugins/package-builder
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        let pipeline = config.to_pipeline().unwrap();

        let names: Vec<_> = pipeline.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["bump", "push", "build"]);
        assert!(pipeline.step("push").is_some());
        assert!(pipeline.step("deploy").is_none());
    }

    #[test]
    fn test_trigger_gates_pipeline() {
        let yaml = r#"
name: release
trigger:
  ref:
    - refs/heads/master
    - refs/tags/*
steps:
  - name: build
    image: plugins/package-builder
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        let pipeline = config.to_pipeline().unwrap();

        let master = PipelineEvent::new(EventKind::Push, "acme/widgets", "master");
        let feature = PipelineEvent::new(EventKind::Push, "acme/widgets", "feature/login");
        let tag = PipelineEvent::new(EventKind::Tag, "acme/widgets", "master").with_tag("v1.0.0");

        assert!(pipeline.should_run(&master));
        assert!(pipeline.should_run(&tag));
        assert!(!pipeline.should_run(&feature));
    }

    #[test]
    fn test_no_trigger_always_runs() {
        let yaml = r#"
name: release
steps:
  - name: build
    image: plugins/package-builder
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        let pipeline = config.to_pipeline().unwrap();
        let event = PipelineEvent::new(EventKind::Cron, "acme/widgets", "master");
        assert!(pipeline.should_run(&event));
    }
}
