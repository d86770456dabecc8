//! Pipeline configuration from YAML

use crate::core::event::EventKind;
use crate::core::pipeline::Pipeline;
use crate::core::predicate::{Predicate, PredicateError, RefGlob};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Error raised while loading a pipeline document
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read pipeline document: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse pipeline document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unsupported document kind `{0}`, expected `pipeline`")]
    UnsupportedKind(String),

    #[error("pipeline has no name")]
    MissingPipelineName,

    #[error("step {0} has no name")]
    MissingStepName(usize),

    #[error("step `{0}` has no executor image")]
    MissingImage(String),

    #[error("duplicate step name `{0}`")]
    DuplicateStep(String),

    #[error("invalid condition on step `{step}`: {source}")]
    StepCondition {
        step: String,
        #[source]
        source: PredicateError,
    },

    #[error("invalid trigger: {0}")]
    Trigger(#[source] PredicateError),
}

/// Setting value - a literal or a named secret reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    /// Plain value, rendered as a string for the executor environment
    Literal(String),

    /// Indirection resolved by the secret provider at invocation time
    Secret { name: String },
}

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Document kind marker (optional, must be `pipeline` when present)
    #[serde(default)]
    pub kind: Option<String>,

    /// Pipeline name
    pub name: String,

    /// Predicate gating whether the pipeline runs at all for a ref
    #[serde(default)]
    pub trigger: Option<TriggerConfig>,

    /// Pipeline steps, executed in declaration order
    pub steps: Vec<StepConfig>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

/// Trigger configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Ref globs, e.g. `refs/heads/master`, `refs/tags/*`
    #[serde(rename = "ref", default)]
    pub refs: Vec<String>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    /// Executor reference (external tool/image)
    #[serde(alias = "executor_image")]
    pub image: String,

    /// Commands run by the executor (optional; plugin-style steps are
    /// driven entirely by settings)
    #[serde(default)]
    pub commands: Vec<String>,

    /// Opaque settings passed to the executor; values may be literals or
    /// `from_secret` references
    #[serde(default)]
    settings: HashMap<String, Value>,

    /// Condition gating this step; absent means always run
    #[serde(default)]
    pub when: Option<WhenConfig>,

    /// Whether a failure of this step is ignored by fail-fast
    #[serde(default)]
    pub ignore_failure: bool,

    /// Timeout for this step (overrides the global default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// `when:` block as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhenConfig {
    /// Branch set membership
    #[serde(default)]
    pub branch: Option<Vec<String>>,

    /// Event kind equality
    #[serde(default)]
    pub event: Option<EventKind>,

    /// Ref glob match
    #[serde(rename = "ref", default)]
    pub refs: Option<Vec<String>>,
}

impl WhenConfig {
    /// Compile the block into a predicate
    ///
    /// A present but empty block is an error: it is more likely a typo'd
    /// condition than a deliberate always-run.
    pub fn compile(&self) -> Result<Predicate, PredicateError> {
        let mut clauses = Vec::new();

        if let Some(branches) = &self.branch {
            if branches.is_empty() {
                return Err(PredicateError::EmptyClause("branch"));
            }
            clauses.push(Predicate::BranchIn(branches.clone()));
        }

        if let Some(kind) = self.event {
            clauses.push(Predicate::EventEquals(kind));
        }

        if let Some(refs) = &self.refs {
            if refs.is_empty() {
                return Err(PredicateError::EmptyClause("ref"));
            }
            let globs = refs
                .iter()
                .map(|p| RefGlob::compile(p))
                .collect::<Result<Vec<_>, _>>()?;
            clauses.push(Predicate::RefGlob(globs));
        }

        match clauses.len() {
            0 => Err(PredicateError::EmptyCondition),
            1 => Ok(clauses.pop().unwrap()),
            _ => Ok(Predicate::And(clauses)),
        }
    }
}

impl TriggerConfig {
    /// Compile the trigger into a predicate
    pub fn compile(&self) -> Result<Predicate, PredicateError> {
        if self.refs.is_empty() {
            return Err(PredicateError::EmptyClause("ref"));
        }
        let globs = self
            .refs
            .iter()
            .map(|p| RefGlob::compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Predicate::RefGlob(globs))
    }
}

impl StepConfig {
    /// Get settings as parsed [`SettingValue`]s
    pub fn get_settings(&self) -> HashMap<String, SettingValue> {
        let mut settings = HashMap::new();

        for (key, value) in &self.settings {
            let parsed = match value {
                Value::String(s) => SettingValue::Literal(s.clone()),
                Value::Bool(b) => SettingValue::Literal(b.to_string()),
                Value::Number(n) => SettingValue::Literal(n.to_string()),
                Value::Mapping(map) => {
                    // Secret reference: { from_secret: <name> }
                    match map
                        .get(&Value::String("from_secret".to_string()))
                        .and_then(|v| v.as_str())
                    {
                        Some(name) => SettingValue::Secret {
                            name: name.to_string(),
                        },
                        None => SettingValue::Literal(
                            serde_yaml::to_string(value)
                                .unwrap_or_default()
                                .trim_end()
                                .to_string(),
                        ),
                    }
                }
                _ => SettingValue::Literal(
                    serde_yaml::to_string(value)
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                ),
            };
            settings.insert(key.clone(), parsed);
        }

        settings
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(kind) = &self.kind {
            if kind != "pipeline" {
                return Err(ConfigError::UnsupportedKind(kind.clone()));
            }
        }

        if self.name.is_empty() {
            return Err(ConfigError::MissingPipelineName);
        }

        // Check that all step names are present and unique
        let mut seen_names = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.name.is_empty() {
                return Err(ConfigError::MissingStepName(index));
            }
            if step.image.is_empty() {
                return Err(ConfigError::MissingImage(step.name.clone()));
            }
            if !seen_names.insert(&step.name) {
                return Err(ConfigError::DuplicateStep(step.name.clone()));
            }
        }

        // Compile every predicate so malformed conditions fail at load,
        // before anything executes
        if let Some(trigger) = &self.trigger {
            trigger.compile().map_err(ConfigError::Trigger)?;
        }
        for step in &self.steps {
            if let Some(when) = &step.when {
                when.compile().map_err(|source| ConfigError::StepCondition {
                    step: step.name.clone(),
                    source,
                })?;
            }
        }

        Ok(())
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Result<Pipeline, ConfigError> {
        Pipeline::from_config(self)
    }
}
