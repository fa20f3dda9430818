//! Result reporting for the CLI (text or JSON)

use crate::constraint::ConstraintFailure;
use crate::lifecycle::{ModuleError, ModuleResult, ModuleState};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Output format enum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,

    /// One JSON object on stdout
    Json,
}

/// JSON shape of a finished invocation, successful or not
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub module: &'a str,
    pub state: ModuleState,
    pub exit_accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a ModuleResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<&'a str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub failures: &'a [ConstraintFailure],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> RunReport<'a> {
    pub fn completed(module: &'a str, result: &'a ModuleResult, accepted: &[i32]) -> Self {
        Self {
            module,
            state: ModuleState::Complete,
            exit_accepted: result.exit_accepted(accepted),
            result: Some(result),
            command: None,
            exit_code: None,
            stderr: None,
            failures: &[],
            error: None,
        }
    }

    pub fn failed(module: &'a str, error: &'a ModuleError) -> Self {
        let execution = error.execution_result();
        Self {
            module,
            state: ModuleState::Failed,
            exit_accepted: false,
            result: None,
            command: error.command().map(|c| c.as_str()),
            exit_code: execution.map(|r| r.exit_code),
            stderr: execution.map(|r| r.stderr.as_str()),
            failures: error.failures(),
            error: Some(error.to_string()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}

/// Text rendering of a completed invocation
pub fn render_result(module: &str, result: &ModuleResult, accepted: &[i32]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "→".cyan(), result.command.as_str().dimmed());

    if !result.captured_output.is_empty() {
        let _ = writeln!(out, "{}", "stdout:".cyan().bold());
        let _ = writeln!(out, "{}", result.captured_output.trim_end());
    }
    if !result.captured_error.is_empty() {
        let _ = writeln!(out, "{}", "stderr:".cyan().bold());
        let _ = writeln!(out, "{}", result.captured_error.trim_end());
    }

    if !result.artifacts.is_empty() {
        let _ = writeln!(out, "{}", "Artifacts:".cyan().bold());
        for artifact in &result.artifacts {
            let _ = writeln!(out, "  {} {}", "•".green(), artifact);
        }
    }

    if result.exit_accepted(accepted) {
        let _ = write!(
            out,
            "{} Module '{}' complete (exit code {})",
            "✓".green(),
            module,
            result.exit_code
        );
    } else {
        let _ = write!(
            out,
            "{} Module '{}' finished with exit code {} (accepted: {:?})",
            "✗".red(),
            module,
            result.exit_code,
            accepted
        );
    }
    out
}

/// Text rendering of a failed invocation: exit code, stderr and every message
pub fn render_failure(module: &str, error: &ModuleError) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} Module '{}' failed after {}",
        "✗".red(),
        module,
        error.failed_from()
    );

    if let Some(command) = error.command() {
        let _ = writeln!(out, "  command: {}", command);
    }
    if let Some(result) = error.execution_result() {
        let _ = writeln!(out, "  exit code: {}", result.exit_code);
        if !result.stderr.is_empty() {
            let _ = writeln!(out, "  stderr: {}", result.stderr.trim_end());
        }
    }

    match error {
        ModuleError::Execution { source, .. } => {
            let _ = writeln!(out, "  {} {}", "•".red(), source);
        }
        _ => {
            for failure in error.failures() {
                let _ = writeln!(out, "  {} {}", "•".red(), failure);
            }
        }
    }
    out.trim_end().to_string()
}
