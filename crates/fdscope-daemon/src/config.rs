//! Daemon configuration

use fdscope_core::ExecutionConfig;
use fdscope_core::config::timeout_from_secs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Environment variables read by [`DaemonConfig::from_env`]
pub const ENV_MAX_RUNS: &str = "FDSCOPE_MAX_RUNS";
pub const ENV_TIMEOUT: &str = "FDSCOPE_TIMEOUT_SECS";
pub const ENV_FD_LIMIT: &str = "FDSCOPE_FD_LIMIT";
pub const ENV_SUMMARIZER: &str = "FDSCOPE_SUMMARIZER";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid value: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Path to Unix socket
    pub socket_path: PathBuf,

    /// Sandboxed runs allowed at once; further requests wait
    pub max_concurrent_runs: usize,

    /// Defaults for runs that do not override timeout or FD limit
    pub execution: ExecutionConfig,

    /// Command fed JSON reports on stdin to produce summaries
    pub summarizer_command: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: fdscope_core::config::default_socket_path(),
            max_concurrent_runs: 4,
            execution: ExecutionConfig::default(),
            summarizer_command: None,
        }
    }
}

impl DaemonConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_MAX_RUNS) {
            config.max_concurrent_runs = match value.parse::<usize>() {
                Ok(0) => return Err(invalid(ENV_MAX_RUNS, value, "must be at least 1")),
                Ok(n) => n,
                Err(e) => return Err(invalid(ENV_MAX_RUNS, value, e)),
            };
        }

        if let Some(value) = lookup(ENV_TIMEOUT) {
            let secs = value
                .parse::<f64>()
                .map_err(|e| invalid(ENV_TIMEOUT, value.clone(), e))?;
            config.execution.timeout =
                timeout_from_secs(secs).map_err(|e| invalid(ENV_TIMEOUT, value, e))?;
        }

        if let Some(value) = lookup(ENV_FD_LIMIT) {
            config.execution.fd_limit = value
                .parse::<u64>()
                .map_err(|e| invalid(ENV_FD_LIMIT, value.clone(), e))?;
        }

        config.summarizer_command = lookup(ENV_SUMMARIZER)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        config
            .execution
            .validate()
            .map_err(|e| invalid(ENV_FD_LIMIT, config.execution.fd_limit.to_string(), e))?;
        Ok(config)
    }
}

fn invalid(var: &'static str, value: String, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value,
        reason: reason.to_string(),
    }
}
