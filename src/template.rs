//! Executable template resolution
//!
//! Templates carry `%s` placeholders that receive the upper-cased workflow
//! name, so `$%s_BWA_HOME/bwa` becomes `$EXOME_BWA_HOME/bwa` and each
//! workflow can point at its own installation. `%%` is a literal percent.
//!
//! Resolution is pure. Expanding the `$VAR` references that remain is a
//! separate step driven by an injected `Environment`.

use crate::context::Environment;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// `$NAME` or `${NAME}`
static ENV_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap()
});

/// Substitute the upper-cased workflow name into every placeholder
pub fn resolve_executable(template: &str, workflow_name: &str) -> String {
    let upper = workflow_name.to_uppercase();
    let mut result = String::with_capacity(template.len() + upper.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            result.push(ch);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                result.push_str(&upper);
            }
            Some('%') => {
                chars.next();
                result.push('%');
            }
            _ => result.push('%'),
        }
    }

    result
}

/// Names of the environment variables a resolved string refers to
pub fn referenced_vars(text: &str) -> Vec<String> {
    ENV_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Expand `$NAME` / `${NAME}`; unknown variables are kept verbatim
pub fn expand_env(text: &str, env: &dyn Environment) -> String {
    ENV_PATTERN
        .replace_all(text, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            env.var(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Template -> workflow-specific path with environment expanded
pub fn resolve_binary(template: &str, workflow_name: &str, env: &dyn Environment) -> String {
    expand_env(&resolve_executable(template, workflow_name), env)
}
