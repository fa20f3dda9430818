//! Output registrar
//!
//! Builds `ArtifactDescriptor` records for the files an invocation produced.
//! The generic rule covers every argument flagged as an artifact; modules
//! whose tools write extra, prefix-named files add `ArtifactSynthesizer`s.

use crate::context::WorkflowContext;
use crate::definition::ModuleDefinition;
use crate::media_type::MediaType;
use crate::value::{FieldValue, FieldValues};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Record handed to the downstream artifact catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    pub parent_path: PathBuf,
    pub media_type: MediaType,
}

impl ArtifactDescriptor {
    /// Describe `path`; the media type falls back to the file extension
    pub fn from_path(path: &Path, media_type: Option<MediaType>) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        let parent_path = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let media_type = media_type
            .or_else(|| MediaType::from_path(path))
            .unwrap_or(MediaType::Binary);
        Some(Self {
            name,
            parent_path,
            media_type,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.parent_path.join(&self.name)
    }
}

impl fmt::Display for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path().display(), self.media_type)
    }
}

/// Per-module hook for files only predictable after execution
pub trait ArtifactSynthesizer: fmt::Debug + Send + Sync {
    /// Field whose bound value seeds the file names
    fn source_field(&self) -> &str;

    fn synthesize(&self, value: &FieldValue, ctx: &WorkflowContext) -> Vec<ArtifactDescriptor>;
}

/// `<value><suffix>`, registered only if the tool actually wrote it
#[derive(Debug, Clone, PartialEq)]
pub struct SiblingSuffix {
    field: String,
    suffix: String,
    media_type: Option<MediaType>,
}

impl SiblingSuffix {
    pub fn new(
        field: impl Into<String>,
        suffix: impl Into<String>,
        media_type: Option<MediaType>,
    ) -> Self {
        Self {
            field: field.into(),
            suffix: suffix.into(),
            media_type,
        }
    }
}

impl ArtifactSynthesizer for SiblingSuffix {
    fn source_field(&self) -> &str {
        &self.field
    }

    fn synthesize(&self, value: &FieldValue, ctx: &WorkflowContext) -> Vec<ArtifactDescriptor> {
        value
            .elements()
            .into_iter()
            .filter_map(FieldValue::as_path)
            .map(|base| {
                let mut name = ctx.resolve_path(&base).into_os_string();
                name.push(&self.suffix);
                PathBuf::from(name)
            })
            .filter(|candidate| candidate.is_file())
            .filter_map(|candidate| ArtifactDescriptor::from_path(&candidate, self.media_type))
            .collect()
    }
}

/// Every file matching `<value><pattern>` (or `<value>/<pattern>` for a directory)
#[derive(Debug, Clone, PartialEq)]
pub struct SiblingGlob {
    field: String,
    pattern: String,
    media_type: Option<MediaType>,
}

impl SiblingGlob {
    pub fn new(
        field: impl Into<String>,
        pattern: impl Into<String>,
        media_type: Option<MediaType>,
    ) -> Self {
        Self {
            field: field.into(),
            pattern: pattern.into(),
            media_type,
        }
    }
}

impl ArtifactSynthesizer for SiblingGlob {
    fn source_field(&self) -> &str {
        &self.field
    }

    fn synthesize(&self, value: &FieldValue, ctx: &WorkflowContext) -> Vec<ArtifactDescriptor> {
        let mut found = Vec::new();

        for base in value.elements().into_iter().filter_map(FieldValue::as_path) {
            let base = ctx.resolve_path(&base);
            let escaped = glob::Pattern::escape(&base.to_string_lossy());
            let pattern = if base.is_dir() {
                format!("{}/{}", escaped, self.pattern)
            } else {
                format!("{}{}", escaped, self.pattern)
            };

            let entries = match glob::glob(&pattern) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(pattern = %pattern, error = %e, "invalid sibling glob");
                    continue;
                }
            };
            found.extend(
                entries
                    .filter_map(Result::ok)
                    .filter(|p| p.is_file())
                    .filter_map(|p| ArtifactDescriptor::from_path(&p, self.media_type)),
            );
        }

        found
    }
}

/// Descriptors for every artifact field plus synthesized siblings
pub fn register_outputs(
    definition: &ModuleDefinition,
    values: &FieldValues,
    ctx: &WorkflowContext,
) -> Vec<ArtifactDescriptor> {
    let mut artifacts = Vec::new();

    for spec in definition
        .arguments()
        .iter()
        .filter(|a| a.persist_as_artifact && !a.disabled)
    {
        for path in values
            .get(&spec.name)
            .elements()
            .into_iter()
            .filter_map(FieldValue::as_path)
        {
            let resolved = ctx.resolve_path(&path);
            artifacts.extend(ArtifactDescriptor::from_path(&resolved, spec.media_type));
        }
    }

    for synthesizer in definition.synthesizers() {
        let value = values.get(synthesizer.source_field());
        artifacts.extend(synthesizer.synthesize(value, ctx));
    }

    // The same file may be named by a field and a synthesizer
    let mut seen = HashSet::new();
    artifacts.retain(|a| seen.insert(a.path()));

    debug!(count = artifacts.len(), "registered artifacts");
    artifacts
}
