//! Validation engine
//!
//! Runs every constraint registered for one phase against the bound values
//! and collects all failures. Nothing short-circuits: N independent
//! violations yield N failures.

use crate::constraint::{Constraint, ConstraintFailure, Phase, Predicate};
use crate::definition::ModuleDefinition;
use crate::value::{FieldValue, FieldValues};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Validate one phase of a definition's constraints
pub fn validate(
    phase: Phase,
    definition: &ModuleDefinition,
    values: &FieldValues,
    base_dir: &Path,
) -> Vec<ConstraintFailure> {
    validate_constraints(phase, definition.constraints(), values, base_dir)
}

/// Validate a loose constraint list (the definition-free form)
pub fn validate_constraints(
    phase: Phase,
    constraints: &[Constraint],
    values: &FieldValues,
    base_dir: &Path,
) -> Vec<ConstraintFailure> {
    let mut failures = Vec::new();

    for constraint in constraints.iter().filter(|c| c.phase == phase) {
        let value = values.get(&constraint.target);
        for message in check(&constraint.predicate, value, base_dir) {
            failures.push(ConstraintFailure {
                field: constraint.target.clone(),
                phase,
                message: constraint.message.clone().unwrap_or(message),
            });
        }
    }

    debug!(%phase, failures = failures.len(), "validation pass finished");
    failures
}

/// Default failure messages for one constraint (empty = satisfied)
fn check(predicate: &Predicate, value: &FieldValue, base_dir: &Path) -> Vec<String> {
    if let Predicate::Required = predicate {
        return if value.is_absent() {
            vec!["is required".to_string()]
        } else {
            Vec::new()
        };
    }

    value
        .elements()
        .into_iter()
        .filter_map(|element| check_element(predicate, element, base_dir))
        .collect()
}

fn check_element(predicate: &Predicate, element: &FieldValue, base_dir: &Path) -> Option<String> {
    match predicate {
        Predicate::Required => None,
        Predicate::FileReadable => check_file(element, base_dir, false),
        Predicate::FileNonEmpty => check_file(element, base_dir, true),
        Predicate::DirectoryExists => {
            let Some(path) = element.as_path() else {
                return Some(format!("expected a directory path, got '{}'", element));
            };
            let resolved = base_dir.join(&path);
            if resolved.is_dir() {
                None
            } else {
                Some(format!("directory '{}' does not exist", path.display()))
            }
        }
        Predicate::Min { value: min } => check_number(element, |n| {
            (n < *min).then(|| format!("value {} is below minimum {}", n, min))
        }),
        Predicate::Max { value: max } => check_number(element, |n| {
            (n > *max).then(|| format!("value {} is above maximum {}", n, max))
        }),
        Predicate::Range { min, max } => check_number(element, |n| {
            (n < *min || n > *max).then(|| format!("value {} is outside [{}, {}]", n, min, max))
        }),
        Predicate::OneOf { values } => {
            let text = element.to_string();
            if values.iter().any(|v| *v == text) {
                None
            } else {
                Some(format!("'{}' is not one of: {}", text, values.join(", ")))
            }
        }
        Predicate::EndsWith { value: suffix } => {
            let text = element.to_string();
            (!text.ends_with(suffix.as_str()))
                .then(|| format!("'{}' does not end with '{}'", text, suffix))
        }
        Predicate::Contains { value: needle } => {
            let text = element.to_string();
            (!text.contains(needle.as_str()))
                .then(|| format!("'{}' does not contain '{}'", text, needle))
        }
        Predicate::Matches { pattern } => match regex::Regex::new(pattern) {
            Ok(re) => {
                let text = element.to_string();
                (!re.is_match(&text))
                    .then(|| format!("'{}' does not match pattern '{}'", text, pattern))
            }
            Err(e) => Some(format!("invalid pattern '{}': {}", pattern, e)),
        },
    }
}

/// Open the file to prove it is there and accessible
fn check_file(element: &FieldValue, base_dir: &Path, non_empty: bool) -> Option<String> {
    let Some(path) = element.as_path() else {
        return Some(format!("expected a file path, got '{}'", element));
    };
    let resolved = base_dir.join(&path);

    let file = match File::open(&resolved) {
        Ok(file) => file,
        Err(e) => return Some(format!("file '{}' cannot be read: {}", path.display(), e)),
    };
    let metadata = match file.metadata() {
        Ok(metadata) => metadata,
        Err(e) => return Some(format!("file '{}' cannot be inspected: {}", path.display(), e)),
    };

    if metadata.is_dir() {
        return Some(format!("'{}' is a directory, not a file", path.display()));
    }
    if non_empty && metadata.len() == 0 {
        return Some(format!("file '{}' is empty", path.display()));
    }
    None
}

fn check_number<F>(element: &FieldValue, test: F) -> Option<String>
where
    F: Fn(f64) -> Option<String>,
{
    match element.as_f64() {
        Some(n) => test(n),
        None => Some(format!("expected a number, got '{}'", element)),
    }
}
