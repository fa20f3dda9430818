//! Module lifecycle controller
//!
//! One `ModuleInstance` per pipeline step invocation:
//!
//! ```text
//! Created -> PreValidated -> Assembled -> Executed -> PostValidated -> Complete
//!    \            \              \            \
//!     +------------+--------------+------------+--> Failed
//! ```
//!
//! `run` consumes the instance, so no instance ever runs twice. A retry is a
//! new instance built by the caller.

use crate::assembler::{assemble_definition, AssembledCommand};
use crate::constraint::{ConstraintFailure, Phase};
use crate::context::WorkflowContext;
use crate::definition::ModuleDefinition;
use crate::executor::{ExecutionError, ExecutionResult, ProcessExecutor};
use crate::registrar::{register_outputs, ArtifactDescriptor};
use crate::validators::validate;
use crate::value::FieldValues;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Created,
    PreValidated,
    Assembled,
    Executed,
    PostValidated,
    Complete,
    Failed,
}

impl ModuleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ModuleState::Complete | ModuleState::Failed)
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Created => "CREATED",
            ModuleState::PreValidated => "PRE_VALIDATED",
            ModuleState::Assembled => "ASSEMBLED",
            ModuleState::Executed => "EXECUTED",
            ModuleState::PostValidated => "POST_VALIDATED",
            ModuleState::Complete => "COMPLETE",
            ModuleState::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// RESULT / ERROR
// ============================================================================

/// Terminal value of a completed invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleResult {
    pub command: AssembledCommand,
    pub exit_code: i32,
    pub captured_output: String,
    pub captured_error: String,
    pub artifacts: Vec<ArtifactDescriptor>,
}

impl ModuleResult {
    /// Whether the exit code is in the caller's accepted set
    pub fn exit_accepted(&self, accepted: &[i32]) -> bool {
        accepted.contains(&self.exit_code)
    }
}

/// Why an invocation ended in `Failed`
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Inputs rejected; nothing was assembled or executed
    #[error("pre-validation failed: {}", join_failures(failures))]
    PreValidation { failures: Vec<ConstraintFailure> },

    /// The command could not be run at all
    #[error("could not execute `{command}`: {source}")]
    Execution {
        command: AssembledCommand,
        #[source]
        source: ExecutionError,
    },

    /// The tool ran but its declared outputs do not hold up
    #[error(
        "post-validation failed (exit code {}): {}",
        result.exit_code,
        join_failures(failures)
    )]
    PostValidation {
        command: AssembledCommand,
        result: ExecutionResult,
        failures: Vec<ConstraintFailure>,
    },
}

impl ModuleError {
    /// State the instance was leaving when it failed
    pub fn failed_from(&self) -> ModuleState {
        match self {
            ModuleError::PreValidation { .. } => ModuleState::Created,
            ModuleError::Execution { .. } => ModuleState::Assembled,
            ModuleError::PostValidation { .. } => ModuleState::Executed,
        }
    }

    pub fn failures(&self) -> &[ConstraintFailure] {
        match self {
            ModuleError::PreValidation { failures } | ModuleError::PostValidation { failures, .. } => {
                failures
            }
            ModuleError::Execution { .. } => &[],
        }
    }

    /// The command, if the instance got far enough to build one
    pub fn command(&self) -> Option<&AssembledCommand> {
        match self {
            ModuleError::PreValidation { .. } => None,
            ModuleError::Execution { command, .. } | ModuleError::PostValidation { command, .. } => {
                Some(command)
            }
        }
    }

    /// Captured process output, surfaced even though POST failed
    pub fn execution_result(&self) -> Option<&ExecutionResult> {
        match self {
            ModuleError::PostValidation { result, .. } => Some(result),
            _ => None,
        }
    }
}

fn join_failures(failures: &[ConstraintFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// INSTANCE
// ============================================================================

/// Definition + bound values + workflow context for one invocation
#[derive(Debug)]
pub struct ModuleInstance {
    definition: Arc<ModuleDefinition>,
    values: FieldValues,
    context: WorkflowContext,
    state: ModuleState,
}

impl ModuleInstance {
    pub fn new(definition: Arc<ModuleDefinition>, values: FieldValues, context: WorkflowContext) -> Self {
        Self {
            definition,
            values,
            context,
            state: ModuleState::Created,
        }
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn definition(&self) -> &ModuleDefinition {
        &self.definition
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    fn advance(&mut self, next: ModuleState) {
        debug!(module = %self.definition.name(), from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    fn fail(&mut self, error: ModuleError) -> ModuleError {
        warn!(module = %self.definition.name(), from = %self.state, error = %error, "module failed");
        self.state = ModuleState::Failed;
        error
    }

    fn pre_validate(&mut self) -> Result<(), ModuleError> {
        let failures = validate(
            Phase::Pre,
            &self.definition,
            &self.values,
            self.context.working_dir(),
        );
        if !failures.is_empty() {
            return Err(self.fail(ModuleError::PreValidation { failures }));
        }
        self.advance(ModuleState::PreValidated);
        Ok(())
    }

    fn assemble(&mut self) -> AssembledCommand {
        let command =
            assemble_definition(&self.definition, self.context.workflow_name(), &self.values);
        self.advance(ModuleState::Assembled);
        command
    }

    /// Dry run: PRE validation and assembly, never executes
    pub fn render(mut self) -> Result<AssembledCommand, ModuleError> {
        self.pre_validate()?;
        Ok(self.assemble())
    }

    /// Drive the instance to a terminal state
    #[instrument(
        skip(self, executor),
        fields(module = %self.definition.name(), workflow = %self.context.workflow_name())
    )]
    pub fn run(mut self, executor: &dyn ProcessExecutor) -> Result<ModuleResult, ModuleError> {
        self.pre_validate()?;
        let command = self.assemble();

        let result = match executor.execute(
            &command,
            self.context.working_dir(),
            self.context.env_overrides(),
        ) {
            Ok(result) => result,
            Err(source) => return Err(self.fail(ModuleError::Execution { command, source })),
        };
        self.advance(ModuleState::Executed);
        if result.exit_code != 0 {
            warn!(exit_code = result.exit_code, "tool exited non-zero");
        }

        let failures = validate(
            Phase::Post,
            &self.definition,
            &self.values,
            self.context.working_dir(),
        );
        if !failures.is_empty() {
            return Err(self.fail(ModuleError::PostValidation {
                command,
                result,
                failures,
            }));
        }
        self.advance(ModuleState::PostValidated);

        let artifacts = register_outputs(&self.definition, &self.values, &self.context);
        self.advance(ModuleState::Complete);
        info!(
            exit_code = result.exit_code,
            artifacts = artifacts.len(),
            "module complete"
        );

        Ok(ModuleResult {
            command,
            exit_code: result.exit_code,
            captured_output: result.stdout,
            captured_error: result.stderr,
            artifacts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::ArgumentSpec;
    use crate::constraint::{Constraint, Predicate};
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Mutex;

    /// Records every command and replays a canned outcome
    struct Recording {
        calls: Mutex<Vec<String>>,
        exit_code: i32,
    }

    impl Recording {
        fn new(exit_code: i32) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                exit_code,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ProcessExecutor for Recording {
        fn execute(
            &self,
            command: &AssembledCommand,
            _working_dir: &Path,
            _env: &BTreeMap<String, String>,
        ) -> Result<ExecutionResult, ExecutionError> {
            self.calls.lock().unwrap().push(command.to_string());
            Ok(ExecutionResult::new(self.exit_code, "out", "err"))
        }
    }

    fn definition() -> Arc<ModuleDefinition> {
        let mut input = ArgumentSpec::new("input");
        input.order = 1;
        let mut threads = ArgumentSpec::new("threads");
        threads.flag = Some("-t".to_string());
        Arc::new(
            ModuleDefinition::new(
                "tool",
                "/opt/%s/tool",
                vec![input, threads],
                vec![Constraint::pre("input", Predicate::Required)],
                vec![],
                vec![],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_pre_failure_never_executes() {
        let executor = Recording::new(0);
        let instance = ModuleInstance::new(definition(), FieldValues::new(), WorkflowContext::new("wf", "."));
        assert_eq!(instance.state(), ModuleState::Created);

        let err = instance.run(&executor).unwrap_err();
        assert!(matches!(err, ModuleError::PreValidation { .. }));
        assert_eq!(err.failed_from(), ModuleState::Created);
        assert_eq!(err.failures().len(), 1);
        assert!(err.command().is_none());
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_run_completes() {
        let executor = Recording::new(0);
        let values = FieldValues::new().with("input", "a.txt").with("threads", 2);
        let result = ModuleInstance::new(definition(), values, WorkflowContext::new("test", "."))
            .run(&executor)
            .unwrap();

        assert_eq!(executor.calls(), vec!["/opt/TEST/tool -t 2 a.txt".to_string()]);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.captured_output, "out");
        assert_eq!(result.captured_error, "err");
        assert!(result.exit_accepted(&[0]));
    }

    #[test]
    fn test_non_zero_exit_is_not_an_error() {
        let executor = Recording::new(1);
        let values = FieldValues::new().with("input", "a.txt");
        let result = ModuleInstance::new(definition(), values, WorkflowContext::new("wf", "."))
            .run(&executor)
            .unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(!result.exit_accepted(&[0]));
        assert!(result.exit_accepted(&[0, 1]));
    }

    #[test]
    fn test_render_is_dry_run() {
        let values = FieldValues::new().with("input", "a.txt");
        let command = ModuleInstance::new(definition(), values, WorkflowContext::new("wf", "."))
            .render()
            .unwrap();
        assert_eq!(command.as_str(), "/opt/WF/tool a.txt");

        let err = ModuleInstance::new(definition(), FieldValues::new(), WorkflowContext::new("wf", "."))
            .render()
            .unwrap_err();
        assert_eq!(err.failures()[0].field, "input");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ModuleState::PreValidated.to_string(), "PRE_VALIDATED");
        assert!(ModuleState::Failed.is_terminal());
        assert!(!ModuleState::Executed.is_terminal());
    }
}
