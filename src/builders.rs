//! Builder patterns for declaring module types
//!
//! Fluent APIs that produce an immutable `ModuleDefinition`. Constraints can
//! be attached next to the argument they check; `build` runs every
//! definition check and reports all problems at once.

use crate::argument::ArgumentSpec;
use crate::constraint::{Constraint, Phase, Predicate};
use crate::definition::{InvalidDefinition, ModuleDefinition};
use crate::media_type::MediaType;
use crate::registrar::ArtifactSynthesizer;
use std::sync::Arc;

// ============================================================================
// MODULE BUILDER
// ============================================================================

/// Fluent builder for a module type
pub struct ModuleBuilder {
    name: String,
    executable: String,
    arguments: Vec<ArgumentSpec>,
    constraints: Vec<Constraint>,
    synthesizers: Vec<Arc<dyn ArtifactSynthesizer>>,
    accept_exit_codes: Vec<i32>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: String::new(),
            arguments: Vec::new(),
            constraints: Vec::new(),
            synthesizers: Vec::new(),
            accept_exit_codes: Vec::new(),
        }
    }

    /// Executable template, `%s` receives the upper-cased workflow name
    pub fn executable(mut self, template: impl Into<String>) -> Self {
        self.executable = template.into();
        self
    }

    /// Add a ready-made spec
    pub fn arg(mut self, spec: ArgumentSpec) -> Self {
        self.arguments.push(spec);
        self
    }

    /// Add an argument using ArgumentBuilder
    pub fn argument<F>(mut self, name: &str, f: F) -> Self
    where
        F: FnOnce(ArgumentBuilder) -> ArgumentBuilder,
    {
        let (spec, constraints) = f(ArgumentBuilder::new(name)).build();
        self.arguments.push(spec);
        self.constraints.extend(constraints);
        self
    }

    /// Add a constraint not tied to an argument builder
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Add a per-module artifact synthesizer
    pub fn synthesizer(mut self, synthesizer: impl ArtifactSynthesizer + 'static) -> Self {
        self.synthesizers.push(Arc::new(synthesizer));
        self
    }

    pub fn accept_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.accept_exit_codes = codes.into_iter().collect();
        self
    }

    /// Build the definition
    pub fn build(self) -> Result<ModuleDefinition, InvalidDefinition> {
        ModuleDefinition::new(
            self.name,
            self.executable,
            self.arguments,
            self.constraints,
            self.synthesizers,
            self.accept_exit_codes,
        )
    }
}

// ============================================================================
// ARGUMENT BUILDER
// ============================================================================

/// Builder for one `ArgumentSpec` and the constraints on it
pub struct ArgumentBuilder {
    spec: ArgumentSpec,
    constraints: Vec<Constraint>,
}

impl ArgumentBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            spec: ArgumentSpec::new(name),
            constraints: Vec::new(),
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.spec.order = order;
        self
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.spec.flag = Some(flag.into());
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.spec.delimiter = delimiter.into();
        self
    }

    /// Glue flag and value into one shell word
    pub fn glued(self) -> Self {
        self.delimiter("")
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.spec.separator = separator.into();
        self
    }

    pub fn repeat_flag(mut self) -> Self {
        self.spec.repeat_flag = true;
        self
    }

    pub fn output(mut self) -> Self {
        self.spec.is_output = true;
        self
    }

    /// Redirect target; implies output
    pub fn redirect(mut self) -> Self {
        self.spec.is_redirect = true;
        self.spec.is_output = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.spec.disabled = true;
        self
    }

    pub fn quoted(mut self) -> Self {
        self.spec.wrap_in_single_quotes = true;
        self
    }

    /// Register as an artifact; implies output
    pub fn artifact(mut self, media_type: Option<MediaType>) -> Self {
        self.spec.persist_as_artifact = true;
        self.spec.is_output = true;
        self.spec.media_type = media_type;
        self
    }

    pub fn required(self) -> Self {
        self.check(Predicate::Required)
    }

    /// PRE-phase constraint on this argument
    pub fn check(mut self, predicate: Predicate) -> Self {
        self.constraints.push(Constraint::pre(self.spec.name.clone(), predicate));
        self
    }

    /// POST-phase constraint on this argument
    pub fn check_post(mut self, predicate: Predicate) -> Self {
        self.constraints.push(Constraint::post(self.spec.name.clone(), predicate));
        self
    }

    /// Constraint with an explicit phase and message
    pub fn check_with(mut self, phase: Phase, predicate: Predicate, message: impl Into<String>) -> Self {
        let constraint = match phase {
            Phase::Pre => Constraint::pre(self.spec.name.clone(), predicate),
            Phase::Post => Constraint::post(self.spec.name.clone(), predicate),
        };
        self.constraints.push(constraint.with_message(message));
        self
    }

    pub fn build(self) -> (ArgumentSpec, Vec<Constraint>) {
        (self.spec, self.constraints)
    }
}

// ============================================================================
// TESTS
// ============================================================================
