//! Lifecycle of one sandboxed run

use crate::result::TerminationReason;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Validating config and materializing the source
    Preparing,
    /// Compiling a C source
    Compiling,
    /// Program is running under sampling
    Running,
    Completed,
    Errored,
    TimedOut,
    CompileFailed,
}

impl RunPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Errored | Self::TimedOut | Self::CompileFailed
        )
    }

    /// Forward edges of the lifecycle; nothing is re-entered
    #[must_use]
    pub const fn can_advance(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Preparing, Self::Compiling | Self::Running | Self::Errored)
                | (Self::Compiling, Self::Running | Self::CompileFailed | Self::Errored)
                | (Self::Running, Self::Completed | Self::Errored | Self::TimedOut)
        )
    }

    #[must_use]
    pub fn advance(self, next: Self) -> Self {
        debug_assert!(self.can_advance(next), "illegal run transition {self} -> {next}");
        tracing::debug!(from = %self, to = %next, "run phase");
        next
    }

    /// Terminal phase matching a termination reason
    #[must_use]
    pub const fn terminal_for(reason: TerminationReason) -> Self {
        match reason {
            TerminationReason::Normal => Self::Completed,
            TerminationReason::Error => Self::Errored,
            TerminationReason::Timeout => Self::TimedOut,
            TerminationReason::CompileError => Self::CompileFailed,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preparing => "preparing",
            Self::Compiling => "compiling",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::TimedOut => "timed_out",
            Self::CompileFailed => "compile_failed",
        })
    }
}
