//! Module definitions
//!
//! A `ModuleDefinition` is the immutable, shared description of one module
//! type: executable template, ordered argument specs, constraints and
//! artifact synthesizers. Construction checks every configuration rule and
//! reports all problems at once.

use crate::argument::ArgumentSpec;
use crate::constraint::{Constraint, Phase, Predicate};
use crate::registrar::ArtifactSynthesizer;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A single configuration defect in a module definition
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    #[error("module name cannot be empty")]
    EmptyName,

    #[error("executable template cannot be empty")]
    EmptyExecutable,

    #[error("argument name cannot be empty")]
    EmptyArgumentName,

    #[error("duplicate argument '{name}'")]
    DuplicateArgument { name: String },

    #[error("redirect argument '{name}' cannot carry a flag ('{flag}')")]
    RedirectWithFlag { name: String, flag: String },

    #[error("more than one redirect argument: {names:?}")]
    MultipleRedirects { names: Vec<String> },

    #[error("constraint '{check}' targets unknown field '{field}'")]
    UnknownConstraintField { field: String, check: String },

    #[error("post constraint '{check}' targets '{field}', which is not an output")]
    PostOnNonOutput { field: String, check: String },

    #[error("artifact field '{field}' must be flagged as output")]
    ArtifactNotOutput { field: String },

    #[error("artifact synthesizer references unknown field '{field}'")]
    UnknownSynthesizerField { field: String },

    #[error("invalid pattern for '{field}': {details}")]
    InvalidPattern { field: String, details: String },

    #[error("range for '{field}' has min {min} greater than max {max}")]
    InvertedRange { field: String, min: f64, max: f64 },

    #[error("duplicate module '{name}' in catalog")]
    DuplicateModule { name: String },

    #[error("unknown key '{key}' in {location}")]
    UnknownKey { location: String, key: String },
}

/// Every defect found while building one definition
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidDefinition {
    pub module: String,
    pub errors: Vec<SpecError>,
}

impl fmt::Display for InvalidDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.module.is_empty() {
            "<unnamed>"
        } else {
            &self.module
        };
        write!(f, "module '{}' has {} definition error(s)", name, self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for InvalidDefinition {}

/// Immutable description of one module type
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    name: String,
    executable: String,
    arguments: Vec<ArgumentSpec>,
    constraints: Vec<Constraint>,
    synthesizers: Vec<Arc<dyn ArtifactSynthesizer>>,
    accept_exit_codes: Vec<i32>,
}

impl ModuleDefinition {
    /// Check and freeze a definition
    pub fn new(
        name: impl Into<String>,
        executable: impl Into<String>,
        arguments: Vec<ArgumentSpec>,
        constraints: Vec<Constraint>,
        synthesizers: Vec<Arc<dyn ArtifactSynthesizer>>,
        accept_exit_codes: Vec<i32>,
    ) -> Result<Self, InvalidDefinition> {
        let definition = Self {
            name: name.into(),
            executable: executable.into(),
            arguments,
            constraints,
            synthesizers,
            accept_exit_codes: if accept_exit_codes.is_empty() {
                vec![0]
            } else {
                accept_exit_codes
            },
        };

        let errors = definition.check();
        if errors.is_empty() {
            Ok(definition)
        } else {
            Err(InvalidDefinition {
                module: definition.name,
                errors,
            })
        }
    }

    fn check(&self) -> Vec<SpecError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(SpecError::EmptyName);
        }
        if self.executable.trim().is_empty() {
            errors.push(SpecError::EmptyExecutable);
        }

        let mut seen = HashSet::new();
        let mut redirects = Vec::new();
        for arg in &self.arguments {
            if arg.name.trim().is_empty() {
                errors.push(SpecError::EmptyArgumentName);
            } else if !seen.insert(arg.name.as_str()) {
                errors.push(SpecError::DuplicateArgument {
                    name: arg.name.clone(),
                });
            }

            if arg.is_redirect {
                if let Some(flag) = arg.flag_token() {
                    errors.push(SpecError::RedirectWithFlag {
                        name: arg.name.clone(),
                        flag: flag.to_string(),
                    });
                }
                redirects.push(arg.name.clone());
            }

            if arg.persist_as_artifact && !arg.is_output {
                errors.push(SpecError::ArtifactNotOutput {
                    field: arg.name.clone(),
                });
            }
        }
        if redirects.len() > 1 {
            errors.push(SpecError::MultipleRedirects { names: redirects });
        }

        for constraint in &self.constraints {
            let check = constraint.predicate.name().to_string();
            match self.argument(&constraint.target) {
                None => errors.push(SpecError::UnknownConstraintField {
                    field: constraint.target.clone(),
                    check,
                }),
                Some(arg) if constraint.phase == Phase::Post && !arg.is_output => {
                    errors.push(SpecError::PostOnNonOutput {
                        field: constraint.target.clone(),
                        check,
                    })
                }
                Some(_) => {}
            }

            match &constraint.predicate {
                Predicate::Matches { pattern } => {
                    if let Err(e) = regex::Regex::new(pattern) {
                        errors.push(SpecError::InvalidPattern {
                            field: constraint.target.clone(),
                            details: e.to_string(),
                        });
                    }
                }
                Predicate::Range { min, max } if min > max => {
                    errors.push(SpecError::InvertedRange {
                        field: constraint.target.clone(),
                        min: *min,
                        max: *max,
                    });
                }
                _ => {}
            }
        }

        for synthesizer in &self.synthesizers {
            let field = synthesizer.source_field();
            if self.argument(field).is_none() {
                errors.push(SpecError::UnknownSynthesizerField {
                    field: field.to_string(),
                });
            }
        }

        errors
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executable template, placeholder unresolved
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Arguments in declaration order
    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentSpec> {
        self.arguments.iter().find(|a| a.name == name)
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn synthesizers(&self) -> &[Arc<dyn ArtifactSynthesizer>] {
        &self.synthesizers
    }

    /// Exit codes the module's authors consider a success
    pub fn accept_exit_codes(&self) -> &[i32] {
        &self.accept_exit_codes
    }
}
