use super::command::{CommandResult, RemoteCommand};
use crate::config::FanOutConfig;
use crate::core::RemoteExecutionError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{Level, event};

/// Runs a single command on its target host.
///
/// A completed command with a non-zero exit code is still `Ok`; `Err` means the
/// command never produced a result (connection failure, timeout, spawn failure).
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, command: &RemoteCommand) -> Result<CommandResult, RemoteExecutionError>;
}

/// Executes through the local shell, or through ssh for hosts that are not local.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    config: FanOutConfig,
}

impl ShellExecutor {
    pub fn new(config: FanOutConfig) -> Self {
        Self { config }
    }

    fn build(&self, command: &RemoteCommand) -> Command {
        let mut process = if self.config.is_local(&command.host) {
            let mut process = Command::new("sh");
            process.arg("-c").arg(&command.command_line);
            process
        } else {
            let mut process = Command::new(&self.config.ssh_program);
            process
                .args(&self.config.ssh_options)
                .arg(&command.host)
                .arg(&command.command_line);
            process
        };
        process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process
    }
}

#[async_trait]
impl RemoteExecutor for ShellExecutor {
    async fn run(&self, command: &RemoteCommand) -> Result<CommandResult, RemoteExecutionError> {
        let transport = |message: String| RemoteExecutionError::Transport {
            host: command.host.clone(),
            message,
        };

        event!(Level::DEBUG, host = %command.host, command = %command.command_line, "running command");
        let mut process = self.build(command);
        let output = process.output();
        let output = match self.config.command_timeout {
            Some(limit) => timeout(limit, output)
                .await
                .map_err(|_| transport(format!("timed out after {:?}", limit)))?,
            None => output.await,
        }
        .map_err(|err| transport(err.to_string()))?;

        // Killed by a signal leaves no exit code.
        let exit_code = output.status.code().unwrap_or(-1);
        Ok(CommandResult::completed(
            exit_code,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ))
    }
}
