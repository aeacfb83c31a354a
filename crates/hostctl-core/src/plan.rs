//! Caller identities, plans and turn items.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CapabilityArgs, ResultEnvelope};

/// Normalized identity of a chat participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CallerId(String);

impl CallerId {
    /// Create a caller id, trimming surrounding whitespace.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    /// The normalized identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CallerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for CallerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<i64> for CallerId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<CallerId> for String {
    fn from(value: CallerId) -> Self {
        value.0
    }
}

/// A single capability invocation requested by the reasoning component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub capability: String,
    #[serde(default)]
    pub args: CapabilityArgs,
}

impl Invocation {
    /// Create an invocation.
    #[must_use]
    pub fn new(capability: impl Into<String>, args: CapabilityArgs) -> Self {
        Self {
            capability: capability.into(),
            args,
        }
    }
}

/// One step of a resolved plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    /// Free text emitted by the reasoning component.
    Text { text: String },
    /// Invoke a capability.
    Invoke(Invocation),
}

impl PlanStep {
    /// Create a text step.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an invoke step.
    #[must_use]
    pub fn invoke(capability: impl Into<String>, args: CapabilityArgs) -> Self {
        Self::Invoke(Invocation::new(capability, args))
    }
}

/// Item produced while executing a plan, in production order.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnItem {
    Text(String),
    Envelope(ResultEnvelope),
}

impl TurnItem {
    /// The envelope, if this item is one.
    #[must_use]
    pub const fn envelope(&self) -> Option<&ResultEnvelope> {
        match self {
            Self::Envelope(env) => Some(env),
            Self::Text(_) => None,
        }
    }
}
