//! CLI command definitions

use crate::core::EventKind;
use clap::Args;

/// Run a pipeline against an event
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Branch the event refers to
    #[arg(long, default_value = "master")]
    pub branch: String,

    /// Event kind
    #[arg(long, value_enum, default_value_t = EventKindArg::Push)]
    pub event: EventKindArg,

    /// Tag name (required for tag events)
    #[arg(long)]
    pub tag: Option<String>,

    /// Repository slug (owner/name)
    #[arg(long, default_value = "local/workspace")]
    pub repo: String,

    /// Secret overrides (name=value), layered over the environment
    #[arg(long, value_parser = parse_key_value)]
    pub secret: Vec<(String, String)>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Output the run report in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List pipelines with run history
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run by ID
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Event kind argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventKindArg {
    Push,
    Tag,
    #[clap(name = "pull_request")]
    PullRequest,
    Promote,
    Cron,
}

impl From<EventKindArg> for EventKind {
    fn from(arg: EventKindArg) -> Self {
        match arg {
            EventKindArg::Push => EventKind::Push,
            EventKindArg::Tag => EventKind::Tag,
            EventKindArg::PullRequest => EventKind::PullRequest,
            EventKindArg::Promote => EventKind::Promote,
            EventKindArg::Cron => EventKind::Cron,
        }
    }
}

/// Parse name=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid name=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("token=hunter2").unwrap(),
            ("token".to_string(), "hunter2".to_string())
        );
        assert_eq!(
            parse_key_value("url=https://x?a=b").unwrap(),
            ("url".to_string(), "https://x?a=b".to_string())
        );
        assert!(parse_key_value("no-equals").is_err());
    }

    #[test]
    fn test_event_kind_arg_conversion() {
        assert_eq!(EventKind::from(EventKindArg::Push), EventKind::Push);
        assert_eq!(
            EventKind::from(EventKindArg::PullRequest),
            EventKind::PullRequest
        );
    }
}
