//! Wire protocol for daemon communication
//!
//! Messages are MessagePack maps (named fields) so internally tagged enums
//! round-trip; see [`crate::frame`] for the length-prefixed framing.

use crate::error::{ErrorKind, FdscopeError};
use crate::inspector::ProcessAnalysis;
use crate::report::ExecutionReport;
use crate::types::ProcessSummary;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Request types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Summaries of every visible process
    ListProcesses,
    /// Full FD analysis of one process
    Analyze { pid: u32 },
    /// Run an uploaded source under the sandbox
    Execute {
        filename: String,
        content: Vec<u8>,
        /// Overrides the daemon's default timeout
        timeout_secs: Option<f64>,
        /// Overrides the daemon's default FD ceiling
        fd_limit: Option<u64>,
    },
    /// Daemon load
    Status,
    Ping,
}

/// Response types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Processes {
        processes: Vec<ProcessSummary>,
    },
    Analysis {
        analysis: ProcessAnalysis,
    },
    /// Completed run; `summary` is prose or the fixed fallback
    Execution {
        report: ExecutionReport,
        summary: String,
    },
    Status {
        active_runs: usize,
        max_concurrent_runs: usize,
        completed_runs: u64,
    },
    Pong,
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Response {
    /// Error response preserving the error's kind
    #[must_use]
    pub fn from_error(err: &FdscopeError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Encode a message to msgpack
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(msg).map_err(|e| FdscopeError::Protocol(e.to_string()))
}

/// Decode a message from msgpack
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    rmp_serde::from_slice(data).map_err(|e| FdscopeError::Protocol(e.to_string()))
}
