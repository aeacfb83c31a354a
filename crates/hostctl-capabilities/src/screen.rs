//! Screenshots and screen recordings through external tools.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Local;
use hostctl_core::{Capability, CapabilityArgs, CapabilityError, CapabilityOutput, ScreenConfig};
use tokio::fs;

use crate::{
    command::{CommandBuilder, run_tool},
    fs::{display, size_mb},
    shell::{expand_home, resolve_executable_path},
};

/// Screenshot tool chosen for this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotBackend {
    /// Configured command line; the output path is appended.
    Custom(String),
    /// `grim` (Wayland).
    Grim,
    /// ImageMagick `import` (X11).
    Import,
    /// `screencapture` (macOS).
    ScreenCapture,
    /// Single `ffmpeg` frame from `gdigrab` (Windows).
    Gdigrab,
}

impl ScreenshotBackend {
    /// Pick the screenshot backend, preferring a configured command.
    ///
    /// # Errors
    /// Returns `Unavailable` when no supported tool is installed.
    pub async fn select(config: &ScreenConfig) -> Result<Self, CapabilityError> {
        if let Some(command) = config.capture_command.as_deref().filter(|c| !c.trim().is_empty()) {
            return Ok(Self::Custom(command.to_string()));
        }

        let candidates = if cfg!(target_os = "macos") {
            vec![("screencapture", Self::ScreenCapture)]
        } else if cfg!(windows) {
            vec![("ffmpeg", Self::Gdigrab)]
        } else if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            vec![("grim", Self::Grim), ("import", Self::Import)]
        } else {
            vec![("import", Self::Import), ("grim", Self::Grim)]
        };

        for (tool, backend) in candidates {
            if resolve_executable_path(tool).await.is_some() {
                return Ok(backend);
            }
        }
        Err(CapabilityError::Unavailable(
            "screenshot capture requires 'grim' (Wayland), 'import' (ImageMagick/X11), \
             'screencapture' (macOS) or 'ffmpeg' (Windows)"
                .into(),
        ))
    }

    /// Command that writes a PNG to `output`.
    #[must_use]
    pub fn command(&self, output: &Path) -> CommandBuilder {
        let out = display(output);
        match self {
            Self::Custom(base) => CommandBuilder::new(base.as_str()).params([out]),
            Self::Grim => CommandBuilder::new("grim").params([out]),
            Self::Import => CommandBuilder::new("import").params(["-window".into(), "root".into(), out]),
            Self::ScreenCapture => CommandBuilder::new("screencapture").params(["-x".into(), out]),
            Self::Gdigrab => CommandBuilder::new("ffmpeg").params([
                "-y".into(),
                "-f".into(),
                "gdigrab".into(),
                "-i".into(),
                "desktop".into(),
                "-frames:v".into(),
                "1".into(),
                out,
            ]),
        }
    }
}

/// `ffmpeg` arguments recording the main display for `secs` seconds.
#[must_use]
pub fn recording_command(config: &ScreenConfig, secs: u64, output: &Path) -> CommandBuilder {
    let (format, input) = if cfg!(target_os = "macos") {
        ("avfoundation", "1:none".to_string())
    } else if cfg!(windows) {
        ("gdigrab", "desktop".to_string())
    } else {
        let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0".into());
        ("x11grab", display)
    };

    CommandBuilder::new("ffmpeg")
        .override_base(config.record_command.as_deref().filter(|c| !c.trim().is_empty()))
        .params([
            "-y".to_string(),
            "-f".into(),
            format.into(),
            "-framerate".into(),
            config.recording_fps.to_string(),
            "-i".into(),
            input,
            "-t".into(),
            secs.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            display(output),
        ])
}

/// Clamp a requested duration into `[1, max]`.
#[must_use]
pub fn clamp_duration(requested: Option<u64>, config: &ScreenConfig) -> u64 {
    let max = config.max_recording_secs.max(1);
    requested
        .unwrap_or(config.default_recording_secs)
        .clamp(1, max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOp {
    Capture,
    Record,
}

/// Screen capture capability; default outputs go to `artifact_dir`.
#[derive(Debug, Clone)]
pub struct ScreenCapability {
    op: ScreenOp,
    artifact_dir: PathBuf,
    config: ScreenConfig,
}

impl ScreenCapability {
    #[must_use]
    pub fn new(op: ScreenOp, artifact_dir: impl Into<PathBuf>, config: ScreenConfig) -> Self {
        Self {
            op,
            artifact_dir: artifact_dir.into(),
            config,
        }
    }

    #[must_use]
    pub fn all(artifact_dir: &Path, config: &ScreenConfig) -> Vec<Arc<dyn Capability>> {
        vec![
            Arc::new(Self::new(ScreenOp::Capture, artifact_dir, config.clone())),
            Arc::new(Self::new(ScreenOp::Record, artifact_dir, config.clone())),
        ]
    }

    fn default_output(&self, stem: &str, ext: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        self.artifact_dir.join(format!("{stem}_{stamp}.{ext}"))
    }

    async fn capture(&self, save_path: Option<PathBuf>) -> Result<CapabilityOutput, CapabilityError> {
        let output = save_path.unwrap_or_else(|| self.default_output("screenshot", "png"));
        prepare_parent(&output).await?;

        let backend = ScreenshotBackend::select(&self.config).await?;
        tracing::info!(?backend, output = %output.display(), "Capturing screenshot");
        run_tool(&backend.command(&output)).await?;

        artifact_output(format!("Screenshot saved to: {}", output.display()), output).await
    }

    async fn record(
        &self,
        duration: Option<u64>,
        output_file: Option<PathBuf>,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let secs = clamp_duration(duration, &self.config);
        let output = output_file.unwrap_or_else(|| self.default_output("recording", "mp4"));
        prepare_parent(&output).await?;

        tracing::info!(secs, output = %output.display(), "Recording screen");
        run_tool(&recording_command(&self.config, secs, &output)).await?;

        Ok(artifact_output(
            format!("Screen recorded for {secs} seconds: {}", output.display()),
            output,
        )
        .await?
        .with("duration_secs", secs)
        .with("fps", self.config.recording_fps))
    }
}

async fn prepare_parent(output: &Path) -> Result<(), CapabilityError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(CapabilityError::io(format!(
            "Failed to create output directory {}",
            parent.display()
        )))?;
    }
    Ok(())
}

async fn artifact_output(
    message: String,
    output: PathBuf,
) -> Result<CapabilityOutput, CapabilityError> {
    let size = fs::metadata(&output)
        .await
        .map_err(|_| CapabilityError::Other(format!("Capture tool did not produce {}", output.display())))?
        .len();
    Ok(CapabilityOutput::new(message)
        .with("file_path", display(&output))
        .with("size_bytes", size)
        .with("size_mb", size_mb(size))
        .with_file(output))
}

#[async_trait]
impl Capability for ScreenCapability {
    fn name(&self) -> &str {
        match self.op {
            ScreenOp::Capture => "capture_screenshot",
            ScreenOp::Record => "record_screen",
        }
    }

    fn description(&self) -> &str {
        match self.op {
            ScreenOp::Capture => "Take a screenshot and send it. Args: save_path (optional).",
            ScreenOp::Record => {
                "Record the screen and send the video. Args: duration (seconds, optional), output_file (optional)."
            }
        }
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<CapabilityOutput, CapabilityError> {
        match self.op {
            ScreenOp::Capture => {
                self.capture(args.optional_path("save_path").map(|p| expand_home(&p)))
                    .await
            }
            ScreenOp::Record => {
                let duration = args.optional_u64("duration")?;
                self.record(
                    duration,
                    args.optional_path("output_file").map(|p| expand_home(&p)),
                )
                .await
            }
        }
    }
}
