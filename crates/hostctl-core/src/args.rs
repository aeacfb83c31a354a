//! Capability arguments.
//!
//! Arguments arrive as a JSON object decided by the reasoning component.
//! Optional arguments treat "absent", `null` and `""` identically: all three
//! mean "use the default". Required arguments reject all three.

use std::{borrow::Cow, path::PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::traits::CapabilityError;

/// Argument mapping for one capability invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityArgs {
    values: Map<String, Value>,
}

impl CapabilityArgs {
    /// Create an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object.
    #[must_use]
    pub const fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an argument value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a raw argument, applying the default sentinel rules.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.values.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(v) => Some(v),
        }
    }

    /// Optional string argument.
    #[must_use]
    pub fn optional_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Required string argument.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the argument is missing or not a string.
    pub fn require_str(&self, key: &str) -> Result<&str, CapabilityError> {
        match self.get(key) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(CapabilityError::InvalidArgument(format!(
                "argument `{key}` must be a string, got {other}"
            ))),
            None => Err(CapabilityError::InvalidArgument(format!(
                "missing required argument `{key}`"
            ))),
        }
    }

    /// Required argument as text; a JSON number is taken as written.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the argument is missing or neither a
    /// string nor a number.
    pub fn require_text(&self, key: &str) -> Result<Cow<'_, str>, CapabilityError> {
        match self.get(key) {
            Some(Value::Number(n)) => Ok(Cow::Owned(n.to_string())),
            _ => self.require_str(key).map(Cow::Borrowed),
        }
    }

    /// Optional path argument.
    #[must_use]
    pub fn optional_path(&self, key: &str) -> Option<PathBuf> {
        self.optional_str(key).map(PathBuf::from)
    }

    /// Required path argument.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the argument is missing.
    pub fn require_path(&self, key: &str) -> Result<PathBuf, CapabilityError> {
        self.require_str(key).map(PathBuf::from)
    }

    /// Optional unsigned integer. Numeric strings are accepted.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the value is present but not a
    /// non-negative integer.
    pub fn optional_u64(&self, key: &str) -> Result<Option<u64>, CapabilityError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| {
            CapabilityError::InvalidArgument(format!(
                "argument `{key}` must be a non-negative integer, got {value}"
            ))
        })
    }

    /// Underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl From<Map<String, Value>> for CapabilityArgs {
    fn from(values: Map<String, Value>) -> Self {
        Self::from_map(values)
    }
}
