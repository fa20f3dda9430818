//! Runtime values bound to argument specs
//!
//! A `FieldValue` is whatever the caller binds to one argument for a single
//! invocation. `FieldValues` is the full binding set, keyed by argument name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Value bound to one argument for one invocation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Unbound / null
    #[default]
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    #[serde(skip_deserializing)]
    Path(PathBuf),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// True when the value contributes nothing to a command line.
    ///
    /// `false`, null, empty strings and empty lists are all absent.
    pub fn is_absent(&self) -> bool {
        match self {
            FieldValue::Absent => true,
            FieldValue::Bool(b) => !b,
            FieldValue::Str(s) => s.is_empty(),
            FieldValue::Path(p) => p.as_os_str().is_empty(),
            FieldValue::List(items) => items.iter().all(FieldValue::is_absent),
            _ => false,
        }
    }

    /// Elements in binding order (a scalar is a one-element list)
    pub fn elements(&self) -> Vec<&FieldValue> {
        match self {
            FieldValue::List(items) => items.iter().filter(|v| !v.is_absent()).collect(),
            other if other.is_absent() => Vec::new(),
            other => vec![other],
        }
    }

    /// Treat the value as a filesystem path (strings and paths only)
    pub fn as_path(&self) -> Option<PathBuf> {
        match self {
            FieldValue::Path(p) => Some(p.clone()),
            FieldValue::Str(s) if !s.is_empty() => Some(PathBuf::from(s)),
            _ => None,
        }
    }

    /// Numeric view used by bound constraints
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Type the raw text of a `key=value` CLI pair.
    pub fn parse_scalar(raw: &str) -> Self {
        match raw {
            "true" => return FieldValue::Bool(true),
            "false" => return FieldValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return FieldValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return FieldValue::Float(f);
            }
        }
        FieldValue::Str(raw.to_string())
    }

    /// Push another value, turning a scalar into a list if needed
    pub fn push(&mut self, value: FieldValue) {
        match self {
            FieldValue::Absent => *self = value,
            FieldValue::List(items) => items.push(value),
            _ => {
                let first = std::mem::take(self);
                *self = FieldValue::List(vec![first, value]);
            }
        }
    }
}

/// Serialized form used on the command line
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Absent => Ok(()),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Str(s) => write!(f, "{}", s),
            FieldValue::Path(p) => write!(f, "{}", p.display()),
            FieldValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<PathBuf> for FieldValue {
    fn from(value: PathBuf) -> Self {
        FieldValue::Path(value)
    }
}

impl From<&std::path::Path> for FieldValue {
    fn from(value: &std::path::Path) -> Self {
        FieldValue::Path(value.to_path_buf())
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Absent, Into::into)
    }
}

/// Values bound for one invocation, keyed by argument name
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct FieldValues(HashMap<String, FieldValue>);

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) a value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style bind
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Append to an existing binding (repeated `--set key=...`)
    pub fn append(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.entry(name.into()).or_default().push(value);
    }

    /// Lookup; unbound names read as `Absent`
    pub fn get(&self, name: &str) -> &FieldValue {
        static ABSENT: FieldValue = FieldValue::Absent;
        self.0.get(name).unwrap_or(&ABSENT)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse `key=value` pairs as given on the command line
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut values = FieldValues::new();
        for pair in pairs {
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected key=value, got '{}'", pair))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("empty key in '{}'", pair));
            }
            values.append(key, FieldValue::parse_scalar(raw));
        }
        Ok(values)
    }

    /// Overlay another binding set; its entries win
    pub fn merge(&mut self, other: FieldValues) {
        self.0.extend(other.0);
    }
}
