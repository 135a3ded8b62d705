use super::command::{CommandResult, RemoteCommand};
use super::executor::RemoteExecutor;
use crate::config::FanOutConfig;
use crate::core::{ReconcileError, RemoteExecutionError, Result};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{Instrument, Level, event, info_span};

/// Result of one dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: RemoteCommand,
    pub result: std::result::Result<CommandResult, RemoteExecutionError>,
}

impl CommandOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(result) if result.was_successful())
    }

    /// What to show for a failed command: stderr when it ran, the error otherwise.
    pub fn failure_detail(&self) -> Option<String> {
        match &self.result {
            Ok(result) if result.was_successful() => None,
            Ok(result) => Some(result.stderr.trim().to_string()),
            Err(err) => Some(err.to_string()),
        }
    }
}

/// Outcomes of a dispatch, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub outcomes: Vec<CommandOutcome>,
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(CommandOutcome::succeeded)
    }

    /// (host, stderr) for every command that did not succeed.
    pub fn failures(&self) -> Vec<(String, String)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| {
                outcome
                    .failure_detail()
                    .map(|detail| (outcome.command.host.clone(), detail))
            })
            .collect()
    }

    /// Fails on the first unsuccessful command.
    pub fn check_results(&self) -> Result<()> {
        match self.outcomes.iter().find(|outcome| !outcome.succeeded()) {
            None => Ok(()),
            Some(outcome) => Err(ReconcileError::Execution(format!(
                "Error executing command {}: {}",
                outcome.command,
                outcome.failure_detail().unwrap_or_default()
            ))),
        }
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            let status = match &outcome.result {
                Ok(result) if result.was_successful() => "ok".to_string(),
                Ok(result) => format!("failed (rc={})", result.exit_code),
                Err(err) => format!("failed ({})", err),
            };
            writeln!(f, "{:<24} {:<40} {}", outcome.command.host, outcome.command.name, status)?;
        }
        Ok(())
    }
}

/// Closes the pool when the dispatch ends or is dropped, so queued commands never start.
struct HaltOnDrop(Arc<Semaphore>);

impl Drop for HaltOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Runs batches of remote commands with bounded parallelism.
#[derive(Clone)]
pub struct FanOut {
    executor: Arc<dyn RemoteExecutor>,
    config: FanOutConfig,
}

impl FanOut {
    pub fn new(executor: Arc<dyn RemoteExecutor>, config: FanOutConfig) -> Result<Self> {
        config.validate().map_err(ReconcileError::Config)?;
        Ok(Self { executor, config })
    }

    pub fn config(&self) -> &FanOutConfig {
        &self.config
    }

    /// Dispatches with the configured `max_parallel`.
    pub async fn dispatch_all(&self, commands: Vec<RemoteCommand>) -> Result<DispatchReport> {
        self.dispatch(commands, self.config.max_parallel).await
    }

    /// Runs every command, at most `max_parallel` at a time, and waits for all of them.
    ///
    /// Per-command failures are collected in the report, never raised. If this future
    /// is dropped before completion, commands still queued are not started while
    /// commands already running are left to finish.
    pub async fn dispatch(
        &self,
        commands: Vec<RemoteCommand>,
        max_parallel: usize,
    ) -> Result<DispatchReport> {
        if max_parallel == 0 {
            return Err(ReconcileError::Execution(
                "max_parallel must be greater than 0".to_string(),
            ));
        }
        if max_parallel > Semaphore::MAX_PERMITS {
            return Err(ReconcileError::Execution(format!(
                "max_parallel {} exceeds the limit of {}",
                max_parallel,
                Semaphore::MAX_PERMITS
            )));
        }
        let span = info_span!("segconf.dispatch", commands = commands.len(), max_parallel);
        self.run_bounded(commands, max_parallel).instrument(span).await
    }

    async fn run_bounded(
        &self,
        commands: Vec<RemoteCommand>,
        max_parallel: usize,
    ) -> Result<DispatchReport> {
        let pool = Arc::new(Semaphore::new(max_parallel));
        let _halt = HaltOnDrop(pool.clone());

        let handles = commands
            .iter()
            .map(|command| {
                let pool = pool.clone();
                let executor = self.executor.clone();
                let command = command.clone();
                tokio::spawn(
                    async move {
                        let _permit = pool
                            .acquire_owned()
                            .await
                            .map_err(|_| RemoteExecutionError::Halted)?;
                        executor.run(&command).await
                    }
                    .in_current_span(),
                )
            })
            .collect::<Vec<_>>();

        let joined = join_all(handles).await;
        let outcomes = commands
            .into_iter()
            .zip(joined)
            .map(|(command, joined)| CommandOutcome {
                command,
                result: joined
                    .unwrap_or_else(|err| Err(RemoteExecutionError::WorkerPanicked(err.to_string()))),
            })
            .collect::<Vec<_>>();

        let report = DispatchReport { outcomes };
        for (host, detail) in report.failures() {
            event!(Level::WARN, host = %host, detail = %detail, "remote command failed");
        }
        event!(
            Level::INFO,
            succeeded = report.outcomes.iter().filter(|o| o.succeeded()).count(),
            total = report.outcomes.len(),
            "dispatch finished"
        );
        Ok(report)
    }
}
