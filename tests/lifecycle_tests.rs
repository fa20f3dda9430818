//! Lifecycle tests against a recording executor
//!
//! No real process is started: the executor records every command it is
//! handed and replays a canned result.

use biomodule::constraint::Predicate;
use biomodule::{
    AssembledCommand, ExecutionError, ExecutionResult, FieldValues, MediaType, ModuleBuilder,
    ModuleDefinition, ModuleError, ModuleInstance, ModuleState, ProcessExecutor, SiblingSuffix,
    WorkflowContext,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// What the fake tool does when "run"
enum Script {
    Exit { code: i32, stderr: &'static str },
    Write { file: &'static str, contents: &'static str },
    Unavailable,
}

struct RecordingExecutor {
    script: Script,
    calls: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl RecordingExecutor {
    fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn commands(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }
}

impl ProcessExecutor for RecordingExecutor {
    fn execute(
        &self,
        command: &AssembledCommand,
        working_dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), env.clone()));

        match &self.script {
            Script::Exit { code, stderr } => Ok(ExecutionResult::new(*code, "", *stderr)),
            Script::Write { file, contents } => {
                fs::write(working_dir.join(file), contents).unwrap();
                Ok(ExecutionResult::new(0, "", ""))
            }
            Script::Unavailable => Err(ExecutionError::Spawn {
                shell: "sh".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no shell"),
            }),
        }
    }
}

fn aligner() -> Arc<ModuleDefinition> {
    Arc::new(
        ModuleBuilder::new("aligner")
            .executable("/opt/%s/tool")
            .argument("threads", |a| a.order(1).flag("-t"))
            .argument("input", |a| a.order(2).glued().required().check(Predicate::FileReadable))
            .argument("output", |a| {
                a.redirect()
                    .artifact(Some(MediaType::Sam))
                    .check_post(Predicate::FileNonEmpty)
            })
            .synthesizer(SiblingSuffix::new("output", ".log", Some(MediaType::Text)))
            .build()
            .unwrap(),
    )
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("in.fa"), ">chr1\nACGT\n").unwrap();
    dir
}

fn values() -> FieldValues {
    FieldValues::new()
        .with("threads", 4)
        .with("input", "in.fa")
        .with("output", "out.sam")
}

#[test]
fn test_pre_failure_makes_zero_executor_calls() {
    let dir = TempDir::new().unwrap();
    let executor = RecordingExecutor::new(Script::Exit { code: 0, stderr: "" });

    let err = ModuleInstance::new(aligner(), values(), WorkflowContext::new("test", dir.path()))
        .run(&executor)
        .unwrap_err();

    assert_eq!(executor.call_count(), 0);
    assert_eq!(err.failed_from(), ModuleState::Created);
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].field, "input");
    assert!(failures[0].message.contains("in.fa"));
}

#[test]
fn test_every_pre_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let executor = RecordingExecutor::new(Script::Exit { code: 0, stderr: "" });
    let def = Arc::new(
        ModuleBuilder::new("strict")
            .executable("tool")
            .argument("a", |a| a.required())
            .argument("b", |a| a.required())
            .argument("c", |a| a.check(Predicate::Range { min: 1.0, max: 2.0 }))
            .build()
            .unwrap(),
    );
    let values = FieldValues::new().with("c", 9);

    let err = ModuleInstance::new(def, values, WorkflowContext::new("wf", dir.path()))
        .run(&executor)
        .unwrap_err();
    assert_eq!(err.failures().len(), 3);
    assert_eq!(executor.call_count(), 0);
}

#[test]
fn test_complete_run_registers_artifacts() {
    let dir = workspace();
    fs::write(dir.path().join("out.sam.log"), "aligned 10 reads").unwrap();
    let executor = RecordingExecutor::new(Script::Write {
        file: "out.sam",
        contents: "@HD\tVN:1.6\n",
    });

    let result = ModuleInstance::new(aligner(), values(), WorkflowContext::new("test", dir.path()))
        .run(&executor)
        .unwrap();

    assert_eq!(executor.commands(), vec!["/opt/TEST/tool -t 4 in.fa > out.sam".to_string()]);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.artifacts.len(), 2);
    assert_eq!(result.artifacts[0].name, "out.sam");
    assert_eq!(result.artifacts[0].media_type, MediaType::Sam);
    assert_eq!(result.artifacts[0].parent_path, dir.path());
    assert_eq!(result.artifacts[1].name, "out.sam.log");
}

#[test]
fn test_non_zero_exit_with_passing_post_is_a_result() {
    let dir = workspace();
    fs::write(dir.path().join("out.sam"), "@HD\tVN:1.6\n").unwrap();
    let executor = RecordingExecutor::new(Script::Exit {
        code: 1,
        stderr: "[W::bwa] truncated input",
    });

    let result = ModuleInstance::new(aligner(), values(), WorkflowContext::new("test", dir.path()))
        .run(&executor)
        .unwrap();

    assert_eq!(result.exit_code, 1);
    assert_eq!(result.captured_error, "[W::bwa] truncated input");
    assert_eq!(result.artifacts.len(), 1);
    assert!(!result.exit_accepted(&[0]));
}

#[test]
fn test_post_failure_surfaces_execution_result() {
    let dir = workspace();
    let executor = RecordingExecutor::new(Script::Exit {
        code: 0,
        stderr: "nothing aligned",
    });

    let err = ModuleInstance::new(aligner(), values(), WorkflowContext::new("test", dir.path()))
        .run(&executor)
        .unwrap_err();

    assert_eq!(executor.call_count(), 1);
    assert_eq!(err.failed_from(), ModuleState::Executed);
    let result = err.execution_result().unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stderr, "nothing aligned");
    assert_eq!(err.failures()[0].field, "output");
    assert_eq!(err.command().unwrap().as_str(), "/opt/TEST/tool -t 4 in.fa > out.sam");
}

#[test]
fn test_executor_fault_is_execution_error() {
    let dir = workspace();
    let executor = RecordingExecutor::new(Script::Unavailable);

    let err = ModuleInstance::new(aligner(), values(), WorkflowContext::new("test", dir.path()))
        .run(&executor)
        .unwrap_err();

    assert!(matches!(err, ModuleError::Execution { .. }));
    assert_eq!(err.failed_from(), ModuleState::Assembled);
    assert!(err.execution_result().is_none());
}

#[test]
fn test_env_overrides_reach_executor() {
    let dir = workspace();
    fs::write(dir.path().join("out.sam"), "x").unwrap();
    let executor = RecordingExecutor::new(Script::Exit { code: 0, stderr: "" });
    let ctx = WorkflowContext::new("test", dir.path()).with_env("TEST_TOOL_HOME", "/srv/tool");

    ModuleInstance::new(aligner(), values(), ctx).run(&executor).unwrap();

    let calls = executor.calls.lock().unwrap();
    assert_eq!(calls[0].1.get("TEST_TOOL_HOME").map(String::as_str), Some("/srv/tool"));
}

#[test]
fn test_instances_share_one_definition() {
    let def = aligner();
    let executor = RecordingExecutor::new(Script::Exit { code: 0, stderr: "" });

    let handles: Vec<_> = (0..4i32)
        .map(|i| {
            let def = Arc::clone(&def);
            std::thread::spawn(move || {
                let dir = workspace();
                fs::write(dir.path().join("out.sam"), "x").unwrap();
                let values = values().with("threads", i + 1);
                let ctx = WorkflowContext::new("test", dir.path());
                ModuleInstance::new(def, values, ctx).render().unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let command = handle.join().unwrap();
        assert!(command.as_str().contains(&format!("-t {}", i + 1)));
    }
    assert_eq!(executor.call_count(), 0);
}
