//! Uniform result record for capability invocations.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Operation-specific result fields.
pub type Payload = Map<String, Value>;

/// Outcome class of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The capability completed.
    Success,
    /// The capability failed, or could not be invoked.
    Error,
    /// Informational reply not produced by a capability.
    Info,
}

/// Result of one capability invocation.
///
/// Error envelopes never carry a file path: attachments are only delivered
/// for successful (or informational) results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Capability that produced the envelope; empty when synthesized.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub capability: String,
    pub status: Status,
    pub message: String,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_path: Option<PathBuf>,
}

impl ResultEnvelope {
    fn new(status: Status, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = match status {
                Status::Success => "Done".to_string(),
                Status::Error => "Operation failed".to_string(),
                Status::Info => "OK".to_string(),
            };
        }
        Self {
            capability: String::new(),
            status,
            message,
            payload: Payload::new(),
            file_path: None,
        }
    }

    /// Create a success envelope.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Status::Success, message)
    }

    /// Create an error envelope.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Status::Error, message)
    }

    /// Create an informational envelope.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Status::Info, message)
    }

    /// Tag the envelope with the capability that produced it.
    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = capability.into();
        self
    }

    /// Replace the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a produced artifact. Ignored on error envelopes.
    #[must_use]
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        if self.status != Status::Error {
            self.file_path = Some(path.into());
        }
        self
    }

    /// Path of the artifact this envelope carries, if any.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Whether the envelope reports a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.status, Status::Error)
    }

    /// Get a payload value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}
