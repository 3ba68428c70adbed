//! Sandboxed execution
//!
//! This module contains the pieces of one sandboxed run:
//! - `group` - process-group spawning, FD ceiling, group kill and reap
//! - `sampler` - concurrent FD sampling of the running child
//! - `phase` - run lifecycle state machine
//! - `executor` - workspace, compile step and run orchestration

pub mod executor;
pub mod group;
pub mod phase;
pub mod sampler;

pub use self::executor::SandboxExecutor;
pub use self::group::{Launch, PosixGroups, ProcessGroups};
pub use self::phase::RunPhase;
pub use self::sampler::{FdSampler, SAMPLE_INTERVAL};
