//! Core traits for capabilities and reasoning.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

use crate::{CallerId, CapabilityArgs, PlanStep, ResultEnvelope, envelope::Payload};

/// Capability failure.
///
/// The `Display` rendering is what the caller sees, so every variant embeds
/// the underlying platform description.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command `{command}` exited with status {}: {}", exit_label(.return_code.as_ref()), error_label(.error))]
    CommandFailed {
        command: String,
        return_code: Option<i32>,
        output: String,
        error: String,
    },
    #[error("Unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Other(String),
}

fn exit_label(code: Option<&i32>) -> String {
    code.map_or_else(|| "unknown (terminated by signal)".to_string(), ToString::to_string)
}

fn error_label(error: &str) -> &str {
    if error.is_empty() { "no error output" } else { error }
}

impl CapabilityError {
    /// Build a mapper from `io::Error` with a context prefix.
    pub fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }

    /// Structured failure detail kept in the error envelope's payload.
    #[must_use]
    pub fn detail(&self) -> Payload {
        let mut payload = Payload::new();
        match self {
            Self::CommandFailed {
                command,
                return_code,
                output,
                error,
            } => {
                payload.insert("command".into(), json!(command));
                payload.insert("output".into(), json!(output));
                payload.insert("error".into(), json!(error));
                payload.insert("return_code".into(), json!(return_code));
            }
            Self::NotFound(path) => {
                payload.insert("path".into(), json!(path.display().to_string()));
            }
            Self::Io { source, .. } => {
                payload.insert("error_kind".into(), json!(format!("{:?}", source.kind())));
            }
            Self::InvalidArgument(_) | Self::Unavailable(_) | Self::Other(_) => {}
        }
        payload
    }
}

/// Value returned by a capability on success.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityOutput {
    pub message: String,
    pub payload: Payload,
    pub file_path: Option<PathBuf>,
}

impl CapabilityOutput {
    /// Create an output with a summary message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            payload: Payload::new(),
            file_path: None,
        }
    }

    /// Add a payload field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Mark an artifact for delivery as an attachment.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Collapse into a success envelope.
    #[must_use]
    pub fn into_envelope(self, capability: &str) -> ResultEnvelope {
        let envelope = ResultEnvelope::success(self.message)
            .with_capability(capability)
            .with_payload(self.payload);
        match self.file_path {
            Some(path) => envelope.with_file_path(path),
            None => envelope,
        }
    }
}

/// A single host action exposed to the dispatcher.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Name used by plans to address this capability.
    fn name(&self) -> &str;

    /// One-line description for the reasoning component.
    fn description(&self) -> &str;

    /// Perform the action once.
    async fn invoke(&self, args: &CapabilityArgs) -> Result<CapabilityOutput, CapabilityError>;
}

/// Conversation handle for one caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Unique handle identifier.
    pub id: Uuid,
    /// Caller this handle belongs to.
    pub caller_id: CallerId,
    /// Token the reasoning component uses to continue the conversation.
    pub continuation_token: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Create a fresh handle for a caller.
    #[must_use]
    pub fn new(caller_id: CallerId) -> Self {
        let id = Uuid::new_v4();
        let continuation_token = format!("session_{caller_id}_{}", id.simple());
        Self {
            id,
            caller_id,
            continuation_token,
            created_at: Utc::now(),
        }
    }
}

/// Reasoning error.
#[derive(Debug, Error)]
pub enum ReasonerError {
    #[error("Reasoning service unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
    #[error("{0}")]
    Other(String),
}

/// External component that turns a message into an ordered plan.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Resolve a message into plan steps for the given session.
    async fn plan(
        &self,
        session: &SessionHandle,
        message: &str,
    ) -> Result<Vec<PlanStep>, ReasonerError>;
}
