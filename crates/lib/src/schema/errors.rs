//! Validation error types.
//!
//! A [`ValidationError`] carries every problem found in a payload rather than
//! stopping at the first, so callers can report all field issues at once.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a single field problem.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    WrongType,
    Empty,
    TooLong,
    OutOfRange,
    NotAllowed,
    InvalidFormat,
    ControlCharacters,
    ScriptInjection,
    PathTraversal,
    DisallowedExtension,
    TooLarge,
    Structure,
    Duplicate,
    WeakPassword,
}

/// One problem with one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Field path, e.g. `title` or `projects/p1/title`
    pub field: String,
    pub kind: IssueKind,
    /// Human-readable description
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }

    /// Return the same issue with `prefix/` prepended to its field path.
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.field = format!("{prefix}/{}", self.field);
        self
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Recoverable input error: the caller must fix the payload. Nothing was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed: {}", summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn new(issues: Vec<FieldIssue>) -> Self {
        Self { issues }
    }

    /// Convenience constructor for a single issue.
    pub fn single(field: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(vec![FieldIssue::new(field, kind, message)])
    }

    /// Ok if no issues were collected, otherwise the error.
    pub fn from_issues(issues: Vec<FieldIssue>) -> Result<(), Self> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Self::new(issues))
        }
    }

    /// Check whether any issue concerns the given field path.
    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }

    /// Check whether any issue has the given kind.
    pub fn has_kind(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|issue| issue.kind == kind)
    }
}

impl From<ValidationError> for crate::Error {
    fn from(err: ValidationError) -> Self {
        crate::Error::Validation(err)
    }
}
