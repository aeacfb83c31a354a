//! Turns the items of one turn into a chat reply.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use hostctl_core::{ResultEnvelope, TurnItem};

/// Longest text sent inline, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;
/// Longest attachment caption, in characters.
pub const MAX_CAPTION_CHARS: usize = 1024;

pub const OVERFLOW_CAPTION: &str = "📄 Response is too long, sent as file.";
pub const FALLBACK_TEXT: &str =
    "I processed your request but couldn't generate a response. Please try again.";
pub const TRUNCATION_NOTICE: &str =
    "\n\n⚠️ Response truncated: it was too long and could not be sent as a file.";

/// A file to send after the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub path: PathBuf,
    pub caption: Option<String>,
    /// Written by the router; removed once delivery was attempted.
    pub temporary: bool,
}

/// What gets sent back for one inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl Reply {
    /// A reply that is only text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.attachments.is_empty()
    }
}

/// Assembles replies: inline text or an overflow file, then attachments.
#[derive(Debug, Clone)]
pub struct OutputRouter {
    artifact_dir: PathBuf,
    debug: bool,
}

impl OutputRouter {
    #[must_use]
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            debug: false,
        }
    }

    /// Append each envelope's JSON to the reply text.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Route the ordered items of one turn.
    #[must_use]
    pub fn route(&self, items: &[TurnItem]) -> Reply {
        let mut fragments: Vec<String> = Vec::new();
        let mut envelopes: Vec<&ResultEnvelope> = Vec::new();
        for item in items {
            match item {
                TurnItem::Text(text) => push_fragment(&mut fragments, text),
                TurnItem::Envelope(envelope) => {
                    push_fragment(&mut fragments, &envelope.message);
                    envelopes.push(envelope);
                }
            }
        }

        if self.debug {
            for envelope in &envelopes {
                match serde_json::to_string_pretty(envelope) {
                    Ok(json) => fragments.push(format!("🔍 Debug:\n{json}")),
                    Err(e) => tracing::warn!(error = %e, "Failed to render envelope"),
                }
            }
        }

        let mut reply = Reply::default();
        if !fragments.is_empty() {
            let text = fragments.join("\n\n");
            if text.chars().count() > MAX_MESSAGE_CHARS {
                match self.write_overflow(&text) {
                    Ok(path) => reply.attachments.push(Attachment {
                        path,
                        caption: Some(OVERFLOW_CAPTION.to_string()),
                        temporary: true,
                    }),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to write overflow file, truncating reply");
                        reply.text = Some(truncate_with_notice(&text));
                    }
                }
            } else {
                reply.text = Some(text);
            }
        }

        for envelope in envelopes {
            if envelope.is_error() {
                continue;
            }
            let Some(path) = envelope.file_path() else {
                continue;
            };
            if !path.is_file() {
                tracing::debug!(path = %path.display(), "Skipping missing artifact");
                continue;
            }
            reply.attachments.push(Attachment {
                path: path.to_path_buf(),
                caption: caption_for(&envelope.message),
                temporary: false,
            });
        }

        if reply.is_empty() {
            reply.text = Some(FALLBACK_TEXT.to_string());
        }
        reply
    }

    fn write_overflow(&self, text: &str) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.artifact_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("response_")
            .suffix(".txt")
            .tempfile_in(&self.artifact_dir)?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        let (_, path) = file.keep().map_err(|e| e.error)?;
        tracing::info!(path = %path.display(), chars = text.chars().count(), "Reply sent as file");
        Ok(path)
    }
}

fn push_fragment(fragments: &mut Vec<String>, text: &str) {
    if !text.trim().is_empty() {
        fragments.push(text.to_string());
    }
}

fn caption_for(message: &str) -> Option<String> {
    (!message.is_empty() && message.chars().count() <= MAX_CAPTION_CHARS)
        .then(|| message.to_string())
}

fn truncate_with_notice(text: &str) -> String {
    let keep = MAX_MESSAGE_CHARS - TRUNCATION_NOTICE.chars().count();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_NOTICE);
    truncated
}
