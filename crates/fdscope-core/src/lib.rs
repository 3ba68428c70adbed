//! # fdscope-core
//!
//! File-descriptor forensics for Linux processes.
//!
//! This crate provides the forensic core:
//! - Point-in-time FD tables, limits and identity read from `/proc`
//! - FD classification and severity scoring shared by every report
//! - Sandboxed execution of untrusted Python/C sources under an FD ceiling
//!   and wall-clock timeout, with concurrent FD sampling
//! - Length-prefixed msgpack framing for the daemon protocol

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod config;
pub mod error;
pub mod frame;
pub mod inspector;
pub mod procfs;
pub mod protocol;
pub mod report;
pub mod result;
pub mod sandbox;
pub mod severity;
pub mod summary;
pub mod types;
pub mod upload;

pub use config::{ExecutionConfig, Language};
pub use error::FdscopeError;
pub use inspector::{ProcessAnalysis, ProcessInspector};
pub use procfs::{ProcFs, ProcessTable};
pub use report::ExecutionReport;
pub use result::{ExecutionMetadata, TerminationReason};
pub use sandbox::SandboxExecutor;
pub use severity::{SeverityLevel, SeverityVerdict};
pub use types::{FdEntry, FdKind, FdSnapshot, ProcessIdentity, ProcessSummary, ResourceLimits};

/// Crate-level result type
pub type Result<T> = std::result::Result<T, FdscopeError>;
