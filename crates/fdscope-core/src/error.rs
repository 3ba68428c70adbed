//! Error types for fdscope-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FdscopeError {
    #[error("process {0} not found")]
    ProcessNotFound(u32),

    #[error("permission denied inspecting process {0}")]
    PermissionDenied(u32),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("configuration error: {0}")]
    InvalidConfig(String),

    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),
}

/// Stable error kind carried across the daemon protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ProcessNotFound,
    PermissionDenied,
    InvalidUpload,
    InvalidConfig,
    SpawnFailed,
    Protocol,
    Internal,
}

impl FdscopeError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ProcessNotFound(_) => ErrorKind::ProcessNotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::InvalidUpload(_) => ErrorKind::InvalidUpload,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::SpawnFailed(_) => ErrorKind::SpawnFailed,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Io(_) | Self::Nix(_) => ErrorKind::Internal,
        }
    }

    /// Map an io error raised while reading `/proc/<pid>` onto the inspection taxonomy.
    pub(crate) fn from_proc_io(pid: u32, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::ProcessNotFound(pid),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(pid),
            _ if err.raw_os_error() == Some(nix::libc::ESRCH) => Self::ProcessNotFound(pid),
            _ => Self::Io(err),
        }
    }
}
