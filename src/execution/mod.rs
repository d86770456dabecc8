//! Pipeline execution

pub mod executor;
pub mod runner;

pub use executor::{ExecutorError, ExitStatus, ProcessExecutor, StepExecutor, StepInvocation};
pub use runner::{EventHandler, PipelineRunner, RunnerEvent, StepError};
