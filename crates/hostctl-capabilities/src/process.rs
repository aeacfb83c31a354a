//! Shell command execution.

use async_trait::async_trait;
use hostctl_core::{Capability, CapabilityArgs, CapabilityError, CapabilityOutput};

use crate::{command::run_group, shell::get_shell_command};

/// Runs a command line through the platform shell.
///
/// The command runs in its own process group with the agent's working
/// directory. There is no timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecuteCommand;

#[async_trait]
impl Capability for ExecuteCommand {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Run a shell command and return its output. Args: command."
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<CapabilityOutput, CapabilityError> {
        let command = args.require_str("command")?;
        let (shell, flag) = get_shell_command();
        tracing::info!(%command, %shell, "Executing command");

        let output = run_group(&shell, &[flag.to_string(), command.to_string()])
            .await?
            .check(command)?;

        let mut message = format!("Command executed: {command}");
        if !output.stdout.is_empty() {
            message.push_str("\n\n");
            message.push_str(&output.stdout);
        }
        Ok(CapabilityOutput::new(message)
            .with("command", command)
            .with("output", output.stdout)
            .with("error", output.stderr)
            .with("return_code", output.return_code))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command_payload() {
        let out = ExecuteCommand
            .invoke(&CapabilityArgs::new().with("command", "echo hello"))
            .await
            .unwrap();
        assert_eq!(out.payload["output"], "hello");
        assert_eq!(out.payload["return_code"], 0);
        assert!(out.message.starts_with("Command executed: echo hello"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure_with_detail() {
        let err = ExecuteCommand
            .invoke(&CapabilityArgs::new().with("command", "echo partial; echo bad >&2; exit 2"))
            .await
            .unwrap_err();
        let detail = err.detail();
        assert_eq!(detail["return_code"], 2);
        assert_eq!(detail["output"], "partial");
        assert_eq!(detail["error"], "bad");
        assert!(err.to_string().contains("bad"));
    }

    #[tokio::test]
    async fn test_blank_command_rejected() {
        let err = ExecuteCommand
            .invoke(&CapabilityArgs::new().with("command", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidArgument(_)));
    }
}
