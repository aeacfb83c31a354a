//! Command building and process-group execution.

use std::{path::PathBuf, process::Stdio};

use command_group::AsyncCommandGroup;
use hostctl_core::CapabilityError;
use thiserror::Error;
use tokio::process::Command;

use crate::shell::resolve_executable_path;

/// Command build error.
#[derive(Debug, Error)]
pub enum CommandBuildError {
    #[error("Base command cannot be parsed: {0}")]
    InvalidBase(String),
    #[error("Base command is empty after parsing")]
    EmptyCommand,
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),
}

impl From<CommandBuildError> for CapabilityError {
    fn from(err: CommandBuildError) -> Self {
        match err {
            CommandBuildError::ExecutableNotFound(_) => Self::Unavailable(err.to_string()),
            CommandBuildError::InvalidBase(_) | CommandBuildError::EmptyCommand => {
                Self::InvalidArgument(err.to_string())
            }
        }
    }
}

/// Parsed command parts (program + args).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParts {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandParts {
    /// Create new command parts.
    #[must_use]
    pub const fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Resolve the program to an absolute path.
    ///
    /// # Errors
    /// Returns error if executable not found.
    pub async fn into_resolved(self) -> Result<(PathBuf, Vec<String>), CommandBuildError> {
        let Self { program, args } = self;
        let executable = resolve_executable_path(&program)
            .await
            .ok_or(CommandBuildError::ExecutableNotFound(program))?;
        Ok((executable, args))
    }
}

/// Builder for constructing host tool commands.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    /// Base executable command, possibly with leading arguments.
    pub base: String,
    /// Optional parameters to append.
    pub params: Option<Vec<String>>,
}

impl CommandBuilder {
    /// Create a new command builder.
    #[must_use]
    pub fn new<S: Into<String>>(base: S) -> Self {
        Self {
            base: base.into(),
            params: None,
        }
    }

    /// Add parameters.
    #[must_use]
    pub fn params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.params = Some(params.into_iter().map(Into::into).collect());
        self
    }

    /// Override the base command when a replacement is configured.
    #[must_use]
    pub fn override_base<S: Into<String>>(mut self, base: Option<S>) -> Self {
        if let Some(base) = base {
            self.base = base.into();
        }
        self
    }

    /// Split the base and append parameters.
    ///
    /// # Errors
    /// Returns error if the base cannot be parsed or yields nothing.
    pub fn build(&self) -> Result<CommandParts, CommandBuildError> {
        let mut parts = split_command_line(&self.base)?;
        if let Some(ref params) = self.params {
            parts.extend(params.iter().cloned());
        }

        if parts.is_empty() {
            return Err(CommandBuildError::EmptyCommand);
        }

        let program = parts.remove(0);
        Ok(CommandParts::new(program, parts))
    }
}

fn split_command_line(input: &str) -> Result<Vec<String>, CommandBuildError> {
    #[cfg(windows)]
    {
        let parts = winsplit::split(input);
        if parts.is_empty() {
            Err(CommandBuildError::EmptyCommand)
        } else {
            Ok(parts)
        }
    }

    #[cfg(not(windows))]
    {
        shlex::split(input).ok_or_else(|| CommandBuildError::InvalidBase(input.to_string()))
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub return_code: Option<i32>,
}

impl ProcessOutput {
    /// Whether the process exited with status 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.return_code, Some(0))
    }

    /// Convert a non-zero exit into a capability failure.
    ///
    /// # Errors
    /// Returns `CommandFailed` unless the process exited with status 0.
    pub fn check(self, command: &str) -> Result<Self, CapabilityError> {
        if self.success() {
            Ok(self)
        } else {
            Err(CapabilityError::CommandFailed {
                command: command.to_string(),
                return_code: self.return_code,
                output: self.stdout,
                error: self.stderr,
            })
        }
    }
}

/// Spawn a program in its own process group and wait for it.
///
/// There is no timeout: the caller blocks until the process exits.
///
/// # Errors
/// Returns error if the process cannot be spawned or awaited.
pub async fn run_group(
    program: impl AsRef<std::ffi::OsStr>,
    args: &[String],
) -> Result<ProcessOutput, CapabilityError> {
    let program = program.as_ref();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let label = program.to_string_lossy().into_owned();
    let child = cmd
        .group_spawn()
        .map_err(CapabilityError::io(format!("Failed to spawn {label}")))?;
    let output = child
        .wait_with_output()
        .await
        .map_err(CapabilityError::io(format!("Failed to wait for {label}")))?;

    tracing::debug!(program = %label, status = ?output.status.code(), "Process finished");

    Ok(ProcessOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        return_code: output.status.code(),
    })
}

/// Build, resolve and run a host tool, failing on non-zero exit.
///
/// # Errors
/// Returns error if the tool is missing, cannot run, or exits non-zero.
pub async fn run_tool(builder: &CommandBuilder) -> Result<ProcessOutput, CapabilityError> {
    let parts = builder.build()?;
    let display = std::iter::once(parts.program.as_str())
        .chain(parts.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");
    let (program, args) = parts.into_resolved().await?;
    run_group(&program, &args).await?.check(&display)
}
