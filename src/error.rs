//! Error types with fix suggestions

use crate::definition::SpecError;
use crate::executor::ExecutionError;
use crate::lifecycle::ModuleError;
use crate::module_file::ModuleFileError;
use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Everything the CLI can fail with
#[derive(Error, Debug)]
pub enum BiomoduleError {
    #[error(transparent)]
    ModuleFile(#[from] ModuleFileError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("no workflow name: pass --workflow or set {var}")]
    MissingWorkflow { var: &'static str },

    #[error("invalid --set value: {0}")]
    InvalidValue(String),

    #[error("path '{path}' does not exist")]
    PathNotFound { path: String },

    #[error("{count} of {total} module file(s) failed to load")]
    CheckFailed { count: usize, total: usize },
}

impl FixSuggestion for BiomoduleError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            BiomoduleError::ModuleFile(e) => e.fix_suggestion(),
            BiomoduleError::Module(e) => e.fix_suggestion(),
            BiomoduleError::MissingWorkflow { .. } => {
                Some("The workflow name selects the tool install, e.g. --workflow exome")
            }
            BiomoduleError::InvalidValue(_) => Some("Use --set name=value (repeat a name to build a list)"),
            BiomoduleError::PathNotFound { .. } => Some("Check the file path"),
            BiomoduleError::CheckFailed { .. } => Some("Fix the definition errors listed above"),
        }
    }
}

impl FixSuggestion for ModuleFileError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ModuleFileError::Io { .. } => Some("Check file path and permissions"),
            ModuleFileError::Parse { .. } => Some("Check YAML syntax: indentation and quoting"),
            ModuleFileError::Invalid { source, .. } => {
                source.errors.first().and_then(FixSuggestion::fix_suggestion)
            }
            ModuleFileError::Sibling { .. } => Some("Give each sibling either `suffix:` or `glob:`"),
            ModuleFileError::Duplicate { .. } => Some("Module names must be unique within a catalog"),
            ModuleFileError::Scan { .. } => Some("Check directory permissions"),
        }
    }
}

impl FixSuggestion for ModuleError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ModuleError::PreValidation { .. } => Some("Correct the listed inputs and run again"),
            ModuleError::Execution { source, .. } => source.fix_suggestion(),
            ModuleError::PostValidation { .. } => {
                Some("The tool ran but its outputs are missing or empty; check stderr")
            }
        }
    }
}

impl FixSuggestion for ExecutionError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ExecutionError::MissingWorkingDir { .. } => Some("Create the directory or pass a different --workdir"),
            ExecutionError::Spawn { .. } => Some("Check that `sh` is installed and on PATH"),
            ExecutionError::Timeout { .. } => Some("Raise --timeout or check the tool is not waiting on input"),
            ExecutionError::Wait(_) => None,
        }
    }
}

impl FixSuggestion for SpecError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            SpecError::EmptyName => Some("Set `module:` to a non-empty name"),
            SpecError::EmptyExecutable => Some("Set `executable:`, e.g. \"$%s_TOOL_HOME/tool\""),
            SpecError::EmptyArgumentName => Some("Every argument needs a `name:`"),
            SpecError::DuplicateArgument { .. } => Some("Use unique argument names"),
            SpecError::RedirectWithFlag { .. } => Some("Remove `flag:` from the redirect argument"),
            SpecError::MultipleRedirects { .. } => Some("Keep `redirect: true` on a single argument"),
            SpecError::UnknownConstraintField { .. } => Some("Attach constraints to declared arguments only"),
            SpecError::PostOnNonOutput { .. } => {
                Some("Add `output: true` to the argument or make the constraint `phase: pre`")
            }
            SpecError::ArtifactNotOutput { .. } => Some("Add `output: true` to the artifact argument"),
            SpecError::UnknownSynthesizerField { .. } => Some("Point `siblings[].field` at a declared argument"),
            SpecError::InvalidPattern { .. } => Some("Check the regex syntax of the `matches` pattern"),
            SpecError::InvertedRange { .. } => Some("Swap `min` and `max`"),
            SpecError::DuplicateModule { .. } => Some("Module names must be unique within a catalog"),
            SpecError::UnknownKey { .. } => Some("Check the key for typos or remove it"),
        }
    }
}
