//! Command assembler
//!
//! Turns (executable template, workflow name, argument specs, bound values)
//! into one shell command string. Rendering is a pure function: the same
//! inputs always produce byte-identical output.
//!
//! Rules:
//! - disabled specs and absent values (null, `false`, `""`, empty list) are
//!   skipped
//! - `true` on a flagged spec renders the flag alone; no other value ever
//!   leaves a flag without its argument
//! - remaining specs are stably sorted by `order`, so declaration order
//!   breaks ties
//! - a redirect spec renders last as `> value`, whatever its order

use crate::argument::ArgumentSpec;
use crate::definition::ModuleDefinition;
use crate::template::resolve_executable;
use crate::value::{FieldValue, FieldValues};
use serde::Serialize;
use std::fmt;
use tracing::{debug, instrument};

/// A fully resolved shell command; immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AssembledCommand(String);

impl AssembledCommand {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssembledCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AssembledCommand {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Assemble the command for a definition
pub fn assemble_definition(
    definition: &ModuleDefinition,
    workflow_name: &str,
    values: &FieldValues,
) -> AssembledCommand {
    assemble(
        definition.executable(),
        workflow_name,
        definition.arguments(),
        values,
    )
}

/// Assemble a command from its raw parts
#[instrument(skip(specs, values), fields(spec_count = specs.len()))]
pub fn assemble(
    template: &str,
    workflow_name: &str,
    specs: &[ArgumentSpec],
    values: &FieldValues,
) -> AssembledCommand {
    let prefix = resolve_executable(template, workflow_name);

    let mut active: Vec<&ArgumentSpec> = specs
        .iter()
        .filter(|spec| !spec.disabled && !values.get(&spec.name).is_absent())
        .collect();
    // Vec::sort_by_key is stable
    active.sort_by_key(|spec| spec.order);

    let mut tokens: Vec<String> = vec![prefix.trim().to_string()];
    let mut redirect = None;

    for spec in active {
        let value = values.get(&spec.name);
        if spec.is_redirect {
            let target = render_value(spec, value);
            if !target.is_empty() {
                redirect = Some(format!("> {}", target));
            }
            continue;
        }
        tokens.extend(render_tokens(spec, value));
    }
    tokens.extend(redirect);

    let command = tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    debug!(command = %command, "assembled command");
    AssembledCommand(command)
}

/// Tokens for one non-redirect spec
fn render_tokens(spec: &ArgumentSpec, value: &FieldValue) -> Vec<String> {
    let elements = value.elements();

    match spec.flag_token() {
        // Boolean switch: the flag is the whole encoding
        Some(flag) if matches!(value, FieldValue::Bool(true)) => vec![flag.to_string()],
        Some(flag) if spec.repeat_flag => elements
            .into_iter()
            .filter_map(|element| join_flag(flag, &spec.delimiter, &serialize(spec, element)))
            .collect(),
        Some(flag) => {
            let joined = join_elements(spec, &elements);
            join_flag(flag, &spec.delimiter, &joined).into_iter().collect()
        }
        None => vec![join_elements(spec, &elements)],
    }
}

/// Redirect target text
fn render_value(spec: &ArgumentSpec, value: &FieldValue) -> String {
    join_elements(spec, &value.elements())
}

/// A flag without its value would swallow the next token, so drop both
fn join_flag(flag: &str, delimiter: &str, value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(format!("{}{}{}", flag, delimiter, value))
    }
}

fn join_elements(spec: &ArgumentSpec, elements: &[&FieldValue]) -> String {
    elements
        .iter()
        .map(|element| serialize(spec, element))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(&spec.separator)
}

/// Serialize one element, single-quoting it verbatim when asked
fn serialize(spec: &ArgumentSpec, element: &FieldValue) -> String {
    let raw = element.to_string();
    if spec.wrap_in_single_quotes {
        format!("'{}'", raw)
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged(name: &str, order: i32, flag: &str) -> ArgumentSpec {
        let mut spec = ArgumentSpec::new(name);
        spec.order = order;
        spec.flag = Some(flag.to_string());
        spec
    }

    fn positional(name: &str, order: i32) -> ArgumentSpec {
        let mut spec = ArgumentSpec::new(name);
        spec.order = order;
        spec
    }

    fn redirect(name: &str, order: i32) -> ArgumentSpec {
        let mut spec = ArgumentSpec::new(name);
        spec.order = order;
        spec.is_redirect = true;
        spec.is_output = true;
        spec
    }

    #[test]
    fn test_threads_positional_and_redirect() {
        let mut input = positional("input", 2);
        input.flag = Some(String::new());
        input.delimiter = String::new();
        let specs = vec![flagged("threads", 1, "-t"), input, redirect("output", 0)];
        let values = FieldValues::new()
            .with("threads", 4)
            .with("input", "in.fa")
            .with("output", "out.sam");

        let command = assemble("/opt/%s/tool", "test", &specs, &values);
        assert_eq!(command.as_str(), "/opt/TEST/tool -t 4 in.fa > out.sam");
    }

    #[test]
    fn test_boolean_flag_alone() {
        let specs = vec![flagged("quiet", 1, "--quiet")];
        let on = FieldValues::new().with("quiet", true);
        assert_eq!(assemble("tool", "wf", &specs, &on).as_str(), "tool --quiet");

        let off = FieldValues::new().with("quiet", false);
        assert_eq!(assemble("tool", "wf", &specs, &off).as_str(), "tool");
    }

    #[test]
    fn test_repeated_quoted_flag() {
        let mut spec = flagged("filter", 1, "--info-filter");
        spec.repeat_flag = true;
        spec.wrap_in_single_quotes = true;
        let values = FieldValues::new().with("filter", vec!["QUAL > 10", "DP > 5"]);

        let command = assemble("vcftool", "wf", &[spec], &values);
        assert_eq!(
            command.as_str(),
            "vcftool --info-filter 'QUAL > 10' --info-filter 'DP > 5'"
        );
    }

    #[test]
    fn test_list_without_repeat_uses_separator() {
        let mut spec = flagged("regions", 1, "-r");
        spec.separator = ",".to_string();
        let values = FieldValues::new().with("regions", vec!["chr1", "chr2"]);
        assert_eq!(
            assemble("bcftools view", "wf", &[spec], &values).as_str(),
            "bcftools view -r chr1,chr2"
        );
    }

    #[test]
    fn test_empty_delimiter_glues_flag_and_value() {
        let mut spec = flagged("mem", 1, "-Xmx");
        spec.delimiter = String::new();
        let values = FieldValues::new().with("mem", "4g");
        assert_eq!(assemble("java", "wf", &[spec], &values).as_str(), "java -Xmx4g");

        let mut spec = flagged("input", 1, "INPUT=");
        spec.delimiter = String::new();
        let values = FieldValues::new().with("input", "a.bam");
        assert_eq!(assemble("picard", "wf", &[spec], &values).as_str(), "picard INPUT=a.bam");
    }

    #[test]
    fn test_order_ties_keep_declaration_order() {
        let specs = vec![
            flagged("c", 5, "-c"),
            flagged("a", 1, "-a"),
            flagged("b", 5, "-b"),
            flagged("z", -1, "-z"),
        ];
        let values = FieldValues::new()
            .with("a", 1)
            .with("b", 2)
            .with("c", 3)
            .with("z", 0);
        assert_eq!(
            assemble("t", "wf", &specs, &values).as_str(),
            "t -z 0 -a 1 -c 3 -b 2"
        );
    }

    #[test]
    fn test_absent_and_disabled_skipped() {
        let mut disabled = flagged("legacy", 2, "--legacy");
        disabled.disabled = true;
        let specs = vec![flagged("a", 1, "-a"), disabled, flagged("b", 3, "-b")];
        let values = FieldValues::new()
            .with("a", FieldValue::Absent)
            .with("legacy", "x")
            .with("b", "y");
        let command = assemble("t", "wf", &specs, &values);
        assert_eq!(command.as_str(), "t -b y");
        assert!(!command.as_str().contains("-a"));
        assert!(!command.as_str().contains("--legacy"));
    }

    #[test]
    fn test_redirect_is_last_regardless_of_order() {
        let specs = vec![
            redirect("out", -100),
            flagged("a", 1, "-a"),
            positional("in", 50),
        ];
        let values = FieldValues::new()
            .with("out", "result.txt")
            .with("a", "x")
            .with("in", "input.bed");
        assert_eq!(
            assemble("tool", "wf", &specs, &values).as_str(),
            "tool -a x input.bed > result.txt"
        );
    }

    #[test]
    fn test_quoting_is_verbatim() {
        let mut spec = positional("expr", 1);
        spec.wrap_in_single_quotes = true;
        let values = FieldValues::new().with("expr", "INFO/DP>10 && QUAL>=30");
        assert_eq!(
            assemble("bcftools filter -i", "wf", &[spec], &values).as_str(),
            "bcftools filter -i 'INFO/DP>10 && QUAL>=30'"
        );
    }

    #[test]
    fn test_no_doubled_whitespace() {
        let specs = vec![positional("a", 1), positional("b", 2)];
        let values = FieldValues::new().with("a", "").with("b", "x");
        assert_eq!(assemble("  tool  ", "wf", &specs, &values).as_str(), "tool x");
    }

    #[test]
    fn test_empty_string_never_leaves_a_bare_flag() {
        let specs = vec![flagged("out", 1, "-o"), positional("input", 2)];
        let values = FieldValues::new().with("out", "").with("input", "in.bam");
        assert_eq!(assemble("tool", "wf", &specs, &values).as_str(), "tool in.bam");

        let mut repeated = flagged("region", 1, "-r");
        repeated.repeat_flag = true;
        let values = FieldValues::new()
            .with("region", vec!["", "chr2"])
            .with("input", "in.bam");
        assert_eq!(
            assemble("tool", "wf", &[repeated, positional("input", 2)], &values).as_str(),
            "tool -r chr2 in.bam"
        );
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let specs = vec![flagged("t", 1, "-t"), positional("ref", 2), positional("reads", 3)];
        let values = FieldValues::new()
            .with("t", 8)
            .with("ref", "hg38.fa")
            .with("reads", vec!["r1.fq", "r2.fq"]);
        let first = assemble("$%s_BWA_HOME/bwa mem", "exome", &specs, &values);
        for _ in 0..10 {
            assert_eq!(assemble("$%s_BWA_HOME/bwa mem", "exome", &specs, &values), first);
        }
        assert_eq!(
            first.as_str(),
            "$EXOME_BWA_HOME/bwa mem -t 8 hg38.fa r1.fq r2.fq"
        );
    }

    #[test]
    fn test_unflagged_true_renders_literal() {
        let specs = vec![positional("flag", 1)];
        let values = FieldValues::new().with("flag", true);
        assert_eq!(assemble("tool", "wf", &specs, &values).as_str(), "tool true");
    }
}
