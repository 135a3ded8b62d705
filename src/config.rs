use crate::core::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Remote execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanOutConfig {
    /// Maximum number of remote commands in flight at once
    pub max_parallel: usize,

    /// Per-command timeout; `None` waits indefinitely
    #[serde(with = "duration_secs")]
    pub command_timeout: Option<Duration>,

    /// Program used to reach remote hosts
    pub ssh_program: String,

    /// Options passed to `ssh_program` before the host name
    pub ssh_options: Vec<String>,

    /// Host names that are run locally instead of over ssh
    pub local_hosts: Vec<String>,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            max_parallel: 16,
            command_timeout: Some(Duration::from_secs(600)),
            ssh_program: "ssh".to_string(),
            ssh_options: vec!["-o".to_string(), "BatchMode=yes".to_string()],
            local_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}

impl FanOutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum parallel commands
    pub fn max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max;
        self
    }

    /// Set per-command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Disable the per-command timeout
    pub fn no_command_timeout(mut self) -> Self {
        self.command_timeout = None;
        self
    }

    pub fn ssh_program(mut self, program: &str) -> Self {
        self.ssh_program = program.to_string();
        self
    }

    pub fn ssh_option(mut self, option: &str) -> Self {
        self.ssh_options.push(option.to_string());
        self
    }

    /// Treat `host` as the local machine
    pub fn local_host(mut self, host: &str) -> Self {
        self.local_hosts.push(host.to_string());
        self
    }

    pub fn is_local(&self, host: &str) -> bool {
        self.local_hosts.iter().any(|local| local == host)
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            ReconcileError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate().map_err(ReconcileError::Config)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_parallel == 0 {
            return Err("max_parallel must be > 0".to_string());
        }

        if self.max_parallel > Semaphore::MAX_PERMITS {
            return Err(format!(
                "max_parallel must be <= {}",
                Semaphore::MAX_PERMITS
            ));
        }

        if self.ssh_program.trim().is_empty() {
            return Err("ssh_program cannot be empty".to_string());
        }

        if self.command_timeout == Some(Duration::ZERO) {
            return Err("command_timeout must be > 0 when set".to_string());
        }

        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}
