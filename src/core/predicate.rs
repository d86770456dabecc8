//! First-class condition model for triggers and step gates

use crate::core::event::{EventKind, PipelineEvent};
use regex::Regex;
use thiserror::Error;

/// Error raised when a condition cannot be compiled at load time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    #[error("condition block has no recognized clauses")]
    EmptyCondition,

    #[error("`{0}` clause has an empty list")]
    EmptyClause(&'static str),

    #[error("invalid ref glob `{pattern}`: {reason}")]
    Glob { pattern: String, reason: String },
}

/// A glob over full git refs, compiled once at load time (not serializable
/// due to the compiled matcher)
#[derive(Debug, Clone)]
pub struct RefGlob {
    pattern: String,
    matcher: Regex,
}

impl RefGlob {
    /// Compile a glob pattern into a matcher
    ///
    /// `*` and `?` stay within one path segment; `**` crosses segments.
    /// Character classes are not part of the glob dialect and are rejected.
    pub fn compile(pattern: &str) -> Result<Self, PredicateError> {
        if pattern.is_empty() {
            return Err(PredicateError::Glob {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        let mut regex = String::from("^");
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    if chars.peek() == Some(&'*') {
                        chars.next();
                        regex.push_str(".*");
                    } else {
                        regex.push_str("[^/]*");
                    }
                }
                '?' => regex.push_str("[^/]"),
                '[' | ']' => {
                    return Err(PredicateError::Glob {
                        pattern: pattern.to_string(),
                        reason: "character classes are not supported".to_string(),
                    });
                }
                other => regex.push_str(&regex_escape_char(other)),
            }
        }
        regex.push('$');

        let matcher = Regex::new(&regex).map_err(|e| PredicateError::Glob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// Check the glob against a full git ref
    pub fn matches(&self, git_ref: &str) -> bool {
        self.matcher.is_match(git_ref)
    }

    /// The original glob pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

fn regex_escape_char(c: char) -> String {
    let mut buf = [0u8; 4];
    regex::escape(c.encode_utf8(&mut buf))
}

/// A condition evaluated against a [`PipelineEvent`]
///
/// Conditions are pure: compiling happens at load time, evaluation cannot
/// fail.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Matches every event (a step with no `when:` block)
    Always,

    /// Current branch is one of the listed names
    BranchIn(Vec<String>),

    /// Event kind equals the given kind
    EventEquals(EventKind),

    /// Full git ref matches at least one of the globs
    RefGlob(Vec<RefGlob>),

    /// All child predicates match
    And(Vec<Predicate>),
}

impl Predicate {
    /// Evaluate the predicate against an event
    pub fn matches(&self, event: &PipelineEvent) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::BranchIn(branches) => branches.iter().any(|b| b == &event.branch),
            Predicate::EventEquals(kind) => *kind == event.kind,
            Predicate::RefGlob(globs) => {
                let git_ref = event.git_ref();
                globs.iter().any(|g| g.matches(&git_ref))
            }
            Predicate::And(clauses) => clauses.iter().all(|c| c.matches(event)),
        }
    }
}
