//! Biomodule CLI - check, render and run module definitions

use anyhow::{Context, Result};
use biomodule::context::{SystemEnv, WORKFLOW_ENV_VAR};
use biomodule::error::{BiomoduleError, FixSuggestion};
use biomodule::module_file::{self, ModuleCatalog};
use biomodule::report::{self, OutputFormat, RunReport};
use biomodule::template::{expand_env, referenced_vars};
use biomodule::{FieldValues, ModuleDefinition, ModuleInstance, ShellExecutor, WorkflowContext};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "biomodule")]
#[command(about = "Run declarative bioinformatics tool modules")]
#[command(version)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a module file, or every *.module.yaml in a directory
    Check {
        /// Module file or directory
        path: PathBuf,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Validate inputs and print the assembled command without running it
    Render {
        #[command(flatten)]
        invocation: Invocation,

        /// Also expand $VARS from the current environment
        #[arg(long)]
        expand: bool,
    },

    /// Run a module through its full lifecycle
    Run {
        #[command(flatten)]
        invocation: Invocation,

        /// Working directory for the tool (default: current directory)
        #[arg(short = 'C', long)]
        workdir: Option<PathBuf>,

        /// Kill the tool after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct Invocation {
    /// Path to a .module.yaml file
    file: PathBuf,

    /// Workflow name (falls back to BIOMODULE_WORKFLOW)
    #[arg(short, long)]
    workflow: Option<String>,

    /// Bind a value: name=value (repeat a name to build a list)
    #[arg(short, long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// YAML file of bound values (--set entries win)
    #[arg(long)]
    values: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Check { path, recursive } => check(&path, recursive),
        Commands::Render { invocation, expand } => render(&invocation, expand),
        Commands::Run {
            invocation,
            workdir,
            timeout,
            format,
        } => run(&invocation, workdir, timeout, format),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.downcast_ref::<BiomoduleError>().and_then(|e| e.fix_suggestion()) {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            std::process::exit(1);
        }
    }
}

fn check(path: &Path, recursive: bool) -> Result<i32> {
    if !path.exists() {
        return Err(BiomoduleError::PathNotFound {
            path: path.display().to_string(),
        }
        .into());
    }

    if path.is_file() {
        let definition = module_file::load(path).map_err(BiomoduleError::from)?;
        print_valid(path, &definition);
        return Ok(0);
    }

    let files = ModuleCatalog::discover(path, recursive).map_err(BiomoduleError::from)?;
    let mut catalog = ModuleCatalog::default();
    let mut failed = 0;

    for file in &files {
        let loaded = module_file::load(file).and_then(|definition| {
            print_valid(file, &definition);
            catalog.insert(file.clone(), definition)
        });
        if let Err(e) = loaded {
            failed += 1;
            eprintln!("{} {}", "✗".red(), e);
            if let Some(suggestion) = e.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
        }
    }

    if failed > 0 {
        return Err(BiomoduleError::CheckFailed {
            count: failed,
            total: files.len(),
        }
        .into());
    }
    println!("{} {} module(s) in '{}'", "✓".green(), catalog.len(), path.display());
    Ok(0)
}

fn print_valid(path: &Path, definition: &ModuleDefinition) {
    println!(
        "{} {} ({}): {} argument(s), {} constraint(s)",
        "✓".green(),
        definition.name().bold(),
        path.display(),
        definition.arguments().len(),
        definition.constraints().len()
    );
}

fn render(invocation: &Invocation, expand: bool) -> Result<i32> {
    let workdir = std::env::current_dir().context("Failed to read current directory")?;
    let (definition, values, ctx) = prepare(invocation, workdir)?;

    let instance = ModuleInstance::new(definition, values, ctx);
    let command = instance.render().map_err(BiomoduleError::from)?;
    if expand {
        let expanded = expand_env(command.as_str(), &SystemEnv);
        let unresolved = referenced_vars(&expanded);
        if !unresolved.is_empty() {
            tracing::warn!(vars = ?unresolved, "environment variables left unexpanded");
        }
        println!("{}", expanded);
    } else {
        println!("{}", command);
    }
    Ok(0)
}

fn run(
    invocation: &Invocation,
    workdir: Option<PathBuf>,
    timeout: Option<u64>,
    format: OutputFormat,
) -> Result<i32> {
    let workdir = match workdir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let (definition, values, ctx) = prepare(invocation, workdir)?;

    let mut executor = ShellExecutor::new();
    if let Some(secs) = timeout {
        executor = executor.timeout(Duration::from_secs(secs));
    }

    let name = definition.name();
    let accepted = definition.accept_exit_codes();
    let outcome = ModuleInstance::new(Arc::clone(&definition), values, ctx).run(&executor);

    match (&outcome, format) {
        (Ok(result), OutputFormat::Text) => println!("{}", report::render_result(name, result, accepted)),
        (Ok(result), OutputFormat::Json) => println!("{}", RunReport::completed(name, result, accepted).to_json()),
        (Err(e), OutputFormat::Text) => {
            eprintln!("{}", report::render_failure(name, e));
            if let Some(suggestion) = e.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
        }
        (Err(e), OutputFormat::Json) => println!("{}", RunReport::failed(name, e).to_json()),
    }

    // The failure has been reported above; only the exit status is left
    match outcome {
        Ok(result) if result.exit_accepted(accepted) => Ok(0),
        // Report the tool's own code so callers can branch on it
        Ok(result) => Ok(if result.exit_code > 0 { result.exit_code } else { 1 }),
        Err(_) => Ok(1),
    }
}

/// Load the definition, bind values and build the workflow context
fn prepare(
    invocation: &Invocation,
    workdir: PathBuf,
) -> Result<(Arc<ModuleDefinition>, FieldValues, WorkflowContext)> {
    if !invocation.file.exists() {
        return Err(BiomoduleError::PathNotFound {
            path: invocation.file.display().to_string(),
        }
        .into());
    }
    let definition = module_file::load(&invocation.file).map_err(BiomoduleError::from)?;

    let mut values = match &invocation.values {
        Some(path) => module_file::load_values(path).map_err(BiomoduleError::from)?,
        None => FieldValues::new(),
    };
    let overrides = FieldValues::from_pairs(invocation.set.iter().map(String::as_str))
        .map_err(BiomoduleError::InvalidValue)?;
    values.merge(overrides);

    let ctx = WorkflowContext::from_env(invocation.workflow.as_deref(), workdir, &SystemEnv)
        .ok_or(BiomoduleError::MissingWorkflow { var: WORKFLOW_ENV_VAR })?;

    Ok((Arc::new(definition), values, ctx))
}
