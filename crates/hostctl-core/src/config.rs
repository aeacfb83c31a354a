//! Agent configuration supplied by the hosting process.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::CallerId;

/// Screen capture and recording settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Recording length when the caller does not give one, in seconds.
    pub default_recording_secs: u64,
    /// Upper bound for any recording, in seconds.
    pub max_recording_secs: u64,
    /// Recording frame rate.
    pub recording_fps: u32,
    /// Replaces the auto-detected screenshot command. The output path is
    /// appended as the last argument.
    pub capture_command: Option<String>,
    /// Replaces `ffmpeg` for recordings.
    pub record_command: Option<String>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            default_recording_secs: 10,
            max_recording_secs: 60,
            recording_fps: 7,
            capture_command: None,
            record_command: None,
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Callers allowed to use the agent. Empty means everyone.
    pub allow_list: Vec<CallerId>,
    /// Where screenshots, recordings, archives and overflow replies go.
    pub artifact_dir: PathBuf,
    /// Where uploaded documents are saved.
    pub upload_dir: PathBuf,
    /// Append raw envelopes to replies.
    pub debug: bool,
    pub screen: ScreenConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            allow_list: Vec::new(),
            artifact_dir: std::env::temp_dir().join("hostctl"),
            upload_dir: PathBuf::from("uploads"),
            debug: false,
            screen: ScreenConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Parse a comma-separated allow-list, skipping blank entries.
    #[must_use]
    pub fn parse_allow_list(raw: &str) -> Vec<CallerId> {
        raw.split(',')
            .map(CallerId::new)
            .filter(|id| !id.as_str().is_empty())
            .collect()
    }
}
