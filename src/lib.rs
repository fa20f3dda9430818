//! Biomodule - declarative wrappers for external bioinformatics tools
//!
//! A module type is a table of argument specs plus constraints. Each
//! invocation validates its inputs, assembles one shell command, runs it,
//! re-validates the declared outputs and registers them as artifacts.

pub mod argument;
pub mod assembler;
pub mod builders;
pub mod constraint;
pub mod context;
pub mod definition;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod media_type;
pub mod module_file;
pub mod registrar;
pub mod report;
pub mod template;
pub mod validators;
pub mod value;

pub use argument::ArgumentSpec;
pub use assembler::{assemble, assemble_definition, AssembledCommand};
pub use builders::{ArgumentBuilder, ModuleBuilder};
pub use constraint::{Constraint, ConstraintFailure, Phase, Predicate};
pub use context::{Environment, MapEnv, SystemEnv, WorkflowContext};
pub use definition::{InvalidDefinition, ModuleDefinition, SpecError};
pub use error::{BiomoduleError, FixSuggestion};
pub use executor::{ExecutionError, ExecutionResult, ProcessExecutor, ShellExecutor};
pub use lifecycle::{ModuleError, ModuleInstance, ModuleResult, ModuleState};
pub use media_type::MediaType;
pub use module_file::{ModuleCatalog, ModuleFileError};
pub use registrar::{ArtifactDescriptor, ArtifactSynthesizer, SiblingGlob, SiblingSuffix};
pub use report::OutputFormat;
pub use template::resolve_executable;
pub use validators::validate;
pub use value::{FieldValue, FieldValues};
