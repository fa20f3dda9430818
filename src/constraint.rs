//! Constraint library
//!
//! Leaf predicates attachable to any field, each tagged with the phase it
//! runs in. Evaluation lives in `validators`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// When a constraint is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Before the command is assembled
    #[default]
    Pre,
    /// After the tool ran, against output fields
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Pre => write!(f, "pre"),
            Phase::Post => write!(f, "post"),
        }
    }
}

/// Predicate over a bound value
///
/// Only `Required` fails on an absent value; every other predicate passes
/// when nothing is bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Predicate {
    Required,
    /// File exists and can be opened for reading
    FileReadable,
    /// File can be opened and is larger than zero bytes
    FileNonEmpty,
    DirectoryExists,
    Min { value: f64 },
    Max { value: f64 },
    Range { min: f64, max: f64 },
    OneOf { values: Vec<String> },
    EndsWith { value: String },
    Contains { value: String },
    Matches { pattern: String },
}

impl Predicate {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Predicate::Required => "required",
            Predicate::FileReadable => "file_readable",
            Predicate::FileNonEmpty => "file_non_empty",
            Predicate::DirectoryExists => "directory_exists",
            Predicate::Min { .. } => "min",
            Predicate::Max { .. } => "max",
            Predicate::Range { .. } => "range",
            Predicate::OneOf { .. } => "one_of",
            Predicate::EndsWith { .. } => "ends_with",
            Predicate::Contains { .. } => "contains",
            Predicate::Matches { .. } => "matches",
        }
    }
}

/// A predicate bound to a field and a phase
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub target: String,
    pub phase: Phase,
    pub predicate: Predicate,
    /// Replaces the default failure message
    pub message: Option<String>,
}

impl Constraint {
    /// PRE-phase constraint
    pub fn pre(target: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            target: target.into(),
            phase: Phase::Pre,
            predicate,
            message: None,
        }
    }

    /// POST-phase constraint
    pub fn post(target: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            target: target.into(),
            phase: Phase::Post,
            predicate,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// One unmet constraint, keyed by field name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintFailure {
    pub field: String,
    pub phase: Phase,
    pub message: String,
}

impl fmt::Display for ConstraintFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
