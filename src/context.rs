//! Workflow context and environment lookup
//!
//! The context carries what the surrounding workflow engine supplies to a
//! single invocation: the active workflow name, the working directory and
//! any extra environment variables for the child process. Environment
//! access goes through the `Environment` trait so nothing in the core reads
//! process state directly.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Env var consulted for the workflow name when none is given explicitly
pub const WORKFLOW_ENV_VAR: &str = "BIOMODULE_WORKFLOW";

/// Read-only environment variable lookup
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed in-memory environment (tests, sandboxed runs)
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl Environment for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Per-invocation context supplied by the workflow engine
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowContext {
    workflow_name: String,
    working_dir: PathBuf,
    env_overrides: BTreeMap<String, String>,
}

impl WorkflowContext {
    pub fn new(workflow_name: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            working_dir: working_dir.into(),
            env_overrides: BTreeMap::new(),
        }
    }

    /// Build from an explicit name, falling back to `BIOMODULE_WORKFLOW`
    pub fn from_env(
        explicit: Option<&str>,
        working_dir: impl Into<PathBuf>,
        env: &dyn Environment,
    ) -> Option<Self> {
        let name = explicit
            .map(str::to_string)
            .or_else(|| env.var(WORKFLOW_ENV_VAR))
            .filter(|n| !n.trim().is_empty())?;
        Some(Self::new(name, working_dir))
    }

    /// Extra variable exported to the child process
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(name.into(), value.into());
        self
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env_overrides
    }

    /// Resolve a bound path against the working directory
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_prefers_explicit() {
        let env = MapEnv::new().with(WORKFLOW_ENV_VAR, "exome");
        let ctx = WorkflowContext::from_env(Some("genome"), "/tmp", &env).unwrap();
        assert_eq!(ctx.workflow_name(), "genome");

        let ctx = WorkflowContext::from_env(None, "/tmp", &env).unwrap();
        assert_eq!(ctx.workflow_name(), "exome");

        assert!(WorkflowContext::from_env(None, "/tmp", &MapEnv::new()).is_none());
        assert!(WorkflowContext::from_env(Some("  "), "/tmp", &MapEnv::new()).is_none());
    }

    #[test]
    fn test_resolve_path() {
        let ctx = WorkflowContext::new("wf", "/data/run1");
        assert_eq!(
            ctx.resolve_path(Path::new("out.bam")),
            PathBuf::from("/data/run1/out.bam")
        );
        assert_eq!(
            ctx.resolve_path(Path::new("/ref/hg38.fa")),
            PathBuf::from("/ref/hg38.fa")
        );
    }

    #[test]
    fn test_env_overrides() {
        let ctx = WorkflowContext::new("wf", ".").with_env("TMPDIR", "/scratch");
        assert_eq!(ctx.env_overrides().get("TMPDIR").map(String::as_str), Some("/scratch"));
    }
}
