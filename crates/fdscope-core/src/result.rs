//! Execution metadata types

use crate::config::Language;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output substrings that indicate the program hit its FD ceiling
pub const FD_LIMIT_INDICATORS: [&str; 3] = ["too many open files", "emfile", "errno 24"];

/// How a sandboxed run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Exited with status 0
    Normal,
    /// Non-zero exit, death by signal, or spawn failure
    Error,
    /// Killed after exceeding the wall-clock budget
    Timeout,
    /// C source did not compile; nothing was run
    CompileError,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::CompileError => "compile_error",
        })
    }
}

/// Metadata of a sandboxed execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// Pid of the program; absent when nothing was spawned
    pub pid: Option<u32>,

    /// Wall-clock duration in seconds, millisecond precision
    pub duration_seconds: f64,

    pub termination_reason: TerminationReason,

    /// Exit status; `-signal` when killed by a signal, absent on timeout
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,

    pub language: Language,

    pub timeout_secs: f64,

    pub fd_limit: u64,

    /// Output carried an FD exhaustion message
    pub fd_limit_exceeded: bool,

    pub sampling_started_at: Option<DateTime<Utc>>,

    pub snapshot_taken_at: Option<DateTime<Utc>>,
}

/// Case-insensitive scan of program output for FD exhaustion messages
#[must_use]
pub fn mentions_fd_exhaustion(stdout: &str, stderr: &str) -> bool {
    let stdout = stdout.to_lowercase();
    let stderr = stderr.to_lowercase();
    FD_LIMIT_INDICATORS
        .iter()
        .any(|needle| stdout.contains(needle) || stderr.contains(needle))
}

/// Round to millisecond precision
#[must_use]
pub fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}
