//! Event context a pipeline run is evaluated against

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of repository event that triggered a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    Tag,
    PullRequest,
    Promote,
    Cron,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Push => "push",
            EventKind::Tag => "tag",
            EventKind::PullRequest => "pull_request",
            EventKind::Promote => "promote",
            EventKind::Cron => "cron",
        };
        f.write_str(name)
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "tag" => Ok(EventKind::Tag),
            "pull_request" => Ok(EventKind::PullRequest),
            "promote" => Ok(EventKind::Promote),
            "cron" => Ok(EventKind::Cron),
            other => Err(format!("unknown event kind: {}", other)),
        }
    }
}

/// Immutable context for one pipeline run
///
/// Created once at invocation time from the hosting environment (or CLI
/// flags) and passed explicitly into the runner, never held as a global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Branch the event refers to
    pub branch: String,

    /// Tag name, present for tag events
    pub tag: Option<String>,

    /// What kind of event this is
    pub kind: EventKind,

    /// Repository slug (owner/name)
    pub repo: String,
}

impl PipelineEvent {
    /// Create an event with no tag
    pub fn new(kind: EventKind, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            tag: None,
            kind,
            repo: repo.into(),
        }
    }

    /// Attach a tag name (implied by tag events)
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// The full git ref this event refers to
    ///
    /// Tag events resolve to `refs/tags/<tag>`, everything else to
    /// `refs/heads/<branch>`.
    pub fn git_ref(&self) -> String {
        match &self.tag {
            Some(tag) => format!("refs/tags/{}", tag),
            None => format!("refs/heads/{}", self.branch),
        }
    }
}
