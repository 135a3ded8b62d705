use crate::core::Segment;
use crate::topology::snapshot::group_by_host;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A shell command to run on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub name: String,
    pub command_line: String,
    pub host: String,
}

impl RemoteCommand {
    pub fn new(
        name: impl Into<String>,
        command_line: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            command_line: command_line.into(),
            host: host.into(),
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.host, self.name, self.command_line)
    }
}

/// Outcome of a command that reached its host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub completed: bool,
}

impl CommandResult {
    pub fn completed(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            completed: true,
        }
    }

    pub fn was_successful(&self) -> bool {
        self.completed && self.exit_code == 0
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cmd had rc={} completed={}\n  stdout='{}'\n  stderr='{}'",
            self.exit_code, self.completed, self.stdout, self.stderr
        )
    }
}

/// Quotes `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn per_host<F>(segments: &[Segment], name: &str, render: F) -> Vec<RemoteCommand>
where
    F: Fn(&Segment) -> String,
{
    group_by_host(segments)
        .into_iter()
        .map(|(host, members)| {
            let command_line = members
                .into_iter()
                .map(&render)
                .collect::<Vec<_>>()
                .join("; ");
            RemoteCommand::new(format!("{} on host '{}'", name, host), command_line, host)
        })
        .collect()
}

/// Fast-stops each segment; one command per host.
pub fn stop_segments(segments: &[Segment]) -> Vec<RemoteCommand> {
    per_host(segments, "remote segment stop", |seg| {
        format!("pg_ctl stop -D {} -m fast", shell_quote(seg.data_directory()))
    })
}

/// Starts each segment on its configured port; one command per host.
pub fn start_segments(segments: &[Segment]) -> Vec<RemoteCommand> {
    per_host(segments, "remote segment start", |seg| {
        let log = format!("{}/pg_log/startup.log", seg.data_directory());
        format!(
            "pg_ctl start -D {} -l {} -w -o {}",
            shell_quote(seg.data_directory()),
            shell_quote(&log),
            shell_quote(&format!("-p {}", seg.port()))
        )
    })
}

/// Removes segment data directories; one command per host.
pub fn clean_segment_directories(segments: &[Segment]) -> Vec<RemoteCommand> {
    per_host(segments, "clean segment directories", |seg| {
        format!("rm -rf {}", shell_quote(seg.data_directory()))
    })
}
