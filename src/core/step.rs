//! Step domain model

use crate::core::config::{ConfigError, SettingValue, StepConfig};
use crate::core::predicate::Predicate;
use std::collections::HashMap;
use std::time::Duration;

/// A single step in a pipeline
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step name
    pub name: String,

    /// Executor reference (external tool/image)
    pub image: String,

    /// Commands the executor runs (may be empty for plugin-style steps)
    pub commands: Vec<String>,

    /// Opaque settings handed to the executor
    pub settings: HashMap<String, SettingValue>,

    /// Condition gating this step
    pub condition: Predicate,

    /// Whether a failure of this step is ignored by fail-fast
    pub ignore_failure: bool,

    /// Maximum wall-clock time for one invocation
    pub timeout: Duration,
}

/// Global defaults applied to steps that do not override them
#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 3600, // external tools can be slow; one hour
        }
    }
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Result<Self, ConfigError> {
        let condition = match &config.when {
            Some(when) => when.compile().map_err(|source| ConfigError::StepCondition {
                step: config.name.clone(),
                source,
            })?,
            None => Predicate::Always,
        };

        Ok(Step {
            name: config.name.clone(),
            image: config.image.clone(),
            commands: config.commands.clone(),
            settings: config.get_settings(),
            condition,
            ignore_failure: config.ignore_failure,
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(defaults.timeout_secs)),
        })
    }
}
