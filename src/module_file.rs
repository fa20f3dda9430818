//! Module definition files
//!
//! Reads `*.module.yaml` files into `ModuleDefinition`s and scans a
//! directory of them into a `ModuleCatalog`. Files go through the same
//! builder as code-declared modules, so every definition check applies.

use crate::argument::ArgumentSpec;
use crate::builders::ModuleBuilder;
use crate::constraint::{Constraint, Phase, Predicate};
use crate::definition::{InvalidDefinition, ModuleDefinition, SpecError};
use crate::media_type::MediaType;
use crate::registrar::{SiblingGlob, SiblingSuffix};
use crate::value::FieldValues;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// File name suffix the catalog scans for
pub const MODULE_FILE_SUFFIX: &str = ".module.yaml";

// ============================================================================
// FILE FORMAT
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct ModuleFile {
    module: String,
    executable: String,
    #[serde(default)]
    accept_exit_codes: Vec<i32>,
    #[serde(default)]
    arguments: Vec<ArgumentEntry>,
    #[serde(default)]
    siblings: Vec<SiblingEntry>,
    #[serde(flatten)]
    extra: Mapping,
}

// Flattened leftovers must come after the fields they sit beside
#[derive(Debug, Clone, Deserialize)]
struct ArgumentEntry {
    #[serde(flatten)]
    spec: ArgumentSpec,
    #[serde(default)]
    constraints: Vec<ConstraintEntry>,
    #[serde(flatten)]
    extra: Mapping,
}

/// `check:` plus its parameters stay in `rest` until the tag is known
#[derive(Debug, Clone, Deserialize)]
struct ConstraintEntry {
    #[serde(default)]
    phase: Phase,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    rest: Mapping,
}

impl ConstraintEntry {
    /// Decode the predicate and return any keys it did not use
    fn predicate(&self) -> Result<(Predicate, Vec<String>), serde_yaml::Error> {
        let predicate: Predicate = serde_yaml::from_value(Value::Mapping(self.rest.clone()))?;
        let known = match serde_yaml::to_value(&predicate)? {
            Value::Mapping(known) => known,
            _ => Mapping::new(),
        };
        let unused = self
            .rest
            .keys()
            .filter(|key| !known.contains_key(*key))
            .map(key_text)
            .collect();
        Ok((predicate, unused))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SiblingEntry {
    field: String,
    #[serde(default)]
    suffix: Option<String>,
    #[serde(default)]
    glob: Option<String>,
    #[serde(default)]
    media_type: Option<MediaType>,
    #[serde(flatten)]
    extra: Mapping,
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn unknown_keys(extra: &Mapping, location: impl Fn() -> String) -> Vec<SpecError> {
    extra
        .keys()
        .map(|key| SpecError::UnknownKey {
            location: location(),
            key: key_text(key),
        })
        .collect()
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error types for module file loading
#[derive(Debug, thiserror::Error)]
pub enum ModuleFileError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: InvalidDefinition,
    },

    #[error("{}: sibling for '{field}' needs exactly one of `suffix` or `glob`", path.display())]
    Sibling { path: PathBuf, field: String },

    #[error("{}: {source} (already defined in {})", path.display(), first.display())]
    Duplicate {
        path: PathBuf,
        first: PathBuf,
        #[source]
        source: SpecError,
    },

    #[error("cannot scan {}: {details}", path.display())]
    Scan { path: PathBuf, details: String },
}

impl ModuleFileError {
    /// File the error points at
    pub fn path(&self) -> &Path {
        match self {
            ModuleFileError::Io { path, .. }
            | ModuleFileError::Parse { path, .. }
            | ModuleFileError::Invalid { path, .. }
            | ModuleFileError::Sibling { path, .. }
            | ModuleFileError::Duplicate { path, .. }
            | ModuleFileError::Scan { path, .. } => path,
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load one definition file
pub fn load(path: &Path) -> Result<ModuleDefinition, ModuleFileError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ModuleFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&yaml, path)
}

/// Parse a definition from YAML text
pub fn from_yaml(yaml: &str) -> Result<ModuleDefinition, ModuleFileError> {
    parse(yaml, Path::new("<inline>"))
}

fn parse(yaml: &str, origin: &Path) -> Result<ModuleDefinition, ModuleFileError> {
    let file: ModuleFile = serde_yaml::from_str(yaml).map_err(|source| ModuleFileError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;

    let parse_error = |source| ModuleFileError::Parse {
        path: origin.to_path_buf(),
        source,
    };
    let mut unknown = unknown_keys(&file.extra, || "module".to_string());

    let mut builder = ModuleBuilder::new(file.module)
        .executable(file.executable)
        .accept_exit_codes(file.accept_exit_codes);

    for entry in file.arguments {
        let name = entry.spec.name.clone();
        unknown.extend(unknown_keys(&entry.extra, || format!("argument '{}'", name)));
        for c in entry.constraints {
            let (predicate, unused) = c.predicate().map_err(parse_error)?;
            unknown.extend(unused.into_iter().map(|key| SpecError::UnknownKey {
                location: format!("'{}' constraint on '{}'", predicate.name(), name),
                key,
            }));
            let constraint = match c.phase {
                Phase::Pre => Constraint::pre(name.clone(), predicate),
                Phase::Post => Constraint::post(name.clone(), predicate),
            };
            builder = builder.constraint(match c.message {
                Some(message) => constraint.with_message(message),
                None => constraint,
            });
        }
        builder = builder.arg(entry.spec);
    }

    for sibling in file.siblings {
        let field = sibling.field.clone();
        unknown.extend(unknown_keys(&sibling.extra, || format!("sibling of '{}'", field)));
        builder = match (sibling.suffix, sibling.glob) {
            (Some(suffix), None) => {
                builder.synthesizer(SiblingSuffix::new(sibling.field, suffix, sibling.media_type))
            }
            (None, Some(pattern)) => {
                builder.synthesizer(SiblingGlob::new(sibling.field, pattern, sibling.media_type))
            }
            _ => {
                return Err(ModuleFileError::Sibling {
                    path: origin.to_path_buf(),
                    field: sibling.field,
                })
            }
        };
    }

    let invalid = |source| ModuleFileError::Invalid {
        path: origin.to_path_buf(),
        source,
    };
    match builder.build() {
        Ok(definition) if unknown.is_empty() => Ok(definition),
        Ok(definition) => Err(invalid(InvalidDefinition {
            module: definition.name().to_string(),
            errors: unknown,
        })),
        Err(mut source) => {
            source.errors.splice(0..0, unknown);
            Err(invalid(source))
        }
    }
}

/// Load a YAML map of bound values
pub fn load_values(path: &Path) -> Result<FieldValues, ModuleFileError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| ModuleFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if yaml.trim().is_empty() {
        return Ok(FieldValues::new());
    }
    serde_yaml::from_str(&yaml).map_err(|source| ModuleFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// CATALOG
// ============================================================================

/// Module definitions loaded from a directory, keyed by module name
#[derive(Debug, Default)]
pub struct ModuleCatalog {
    modules: BTreeMap<String, (PathBuf, Arc<ModuleDefinition>)>,
}

impl ModuleCatalog {
    /// Every `*.module.yaml` under `dir`, sorted
    ///
    /// A missing directory yields nothing.
    pub fn discover(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, ModuleFileError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = if recursive {
            let mut paths = Vec::new();
            for entry in WalkDir::new(dir).follow_links(true) {
                let entry = entry.map_err(|e| ModuleFileError::Scan {
                    path: dir.to_path_buf(),
                    details: e.to_string(),
                })?;
                if entry.file_type().is_file() && is_module_file(entry.path()) {
                    paths.push(entry.into_path());
                }
            }
            paths
        } else {
            let pattern = format!(
                "{}/*{}",
                glob::Pattern::escape(&dir.to_string_lossy()),
                MODULE_FILE_SUFFIX
            );
            let entries = glob::glob(&pattern).map_err(|e| ModuleFileError::Scan {
                path: dir.to_path_buf(),
                details: e.to_string(),
            })?;
            entries
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ModuleFileError::Scan {
                    path: dir.to_path_buf(),
                    details: e.to_string(),
                })?
        };

        paths.sort();
        debug!(dir = %dir.display(), recursive, found = paths.len(), "discovered module files");
        Ok(paths)
    }

    /// Load every module file under `dir`; stops at the first bad file
    pub fn scan(dir: &Path, recursive: bool) -> Result<Self, ModuleFileError> {
        let mut catalog = Self::default();
        for path in Self::discover(dir, recursive)? {
            let definition = load(&path)?;
            catalog.insert(path, definition)?;
        }
        Ok(catalog)
    }

    /// Add a definition; a second module with the same name is rejected
    pub fn insert(&mut self, path: PathBuf, definition: ModuleDefinition) -> Result<(), ModuleFileError> {
        if let Some((first, _)) = self.modules.get(definition.name()) {
            return Err(ModuleFileError::Duplicate {
                first: first.clone(),
                source: SpecError::DuplicateModule {
                    name: definition.name().to_string(),
                },
                path,
            });
        }
        self.modules
            .insert(definition.name().to_string(), (path, Arc::new(definition)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModuleDefinition>> {
        self.modules.get(name).map(|(_, def)| Arc::clone(def))
    }

    /// File a module was loaded from
    pub fn source(&self, name: &str) -> Option<&Path> {
        self.modules.get(name).map(|(path, _)| path.as_path())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn is_module_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(MODULE_FILE_SUFFIX))
        .unwrap_or(false)
}
