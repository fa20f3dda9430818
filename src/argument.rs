//! Argument specifications
//!
//! One `ArgumentSpec` per configurable parameter of a module type. Specs are
//! plain data; they are checked when a `ModuleDefinition` is built and
//! consumed by the assembler.

use crate::media_type::MediaType;
use serde::{Deserialize, Serialize};

/// Default delimiter between a flag and its value
pub const DEFAULT_DELIMITER: &str = " ";

/// Static descriptor for one command-line parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    /// Field name values are bound under
    pub name: String,

    /// Explicit position; declaration order breaks ties
    #[serde(default)]
    pub order: i32,

    /// Flag token (`-t`, `--quiet`); `None` for positional arguments
    #[serde(default)]
    pub flag: Option<String>,

    /// Text between flag and value; empty glues them into one word
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Joins list elements when the flag is not repeated
    #[serde(default = "default_delimiter")]
    pub separator: String,

    /// Repeat the flag for every list element
    #[serde(default)]
    pub repeat_flag: bool,

    /// Names a file the tool is expected to produce
    #[serde(default, rename = "output")]
    pub is_output: bool,

    /// Rendered as `> value` at the very end of the command
    #[serde(default, rename = "redirect")]
    pub is_redirect: bool,

    #[serde(default)]
    pub disabled: bool,

    /// Wrap each serialized value in single quotes
    #[serde(default, rename = "quote")]
    pub wrap_in_single_quotes: bool,

    /// Register the bound file as an artifact after a successful run
    #[serde(default, rename = "artifact")]
    pub persist_as_artifact: bool,

    #[serde(default)]
    pub media_type: Option<MediaType>,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

impl ArgumentSpec {
    /// Positional argument with defaults everywhere
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: 0,
            flag: None,
            delimiter: default_delimiter(),
            separator: default_delimiter(),
            repeat_flag: false,
            is_output: false,
            is_redirect: false,
            disabled: false,
            wrap_in_single_quotes: false,
            persist_as_artifact: false,
            media_type: None,
        }
    }

    /// Flag token, with the empty string read as "no flag"
    pub fn flag_token(&self) -> Option<&str> {
        self.flag.as_deref().filter(|f| !f.is_empty())
    }
}
