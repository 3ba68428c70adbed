//! Observed process state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of an open file descriptor.
///
/// Variants are declared in ascending risk order, so the derived `Ord`
/// ranks `Standard < File < Pipe < Other < Socket`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FdKind {
    Standard,
    File,
    Pipe,
    Other,
    Socket,
}

impl FdKind {
    pub const ALL: [Self; 5] = [
        Self::Standard,
        Self::File,
        Self::Pipe,
        Self::Other,
        Self::Socket,
    ];

    /// Display rank, 1 (least kernel state retained) through 5
    #[must_use]
    pub const fn risk_rank(self) -> u8 {
        match self {
            Self::Standard => 1,
            Self::File => 2,
            Self::Pipe => 3,
            Self::Other => 4,
            Self::Socket => 5,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::File => "File",
            Self::Pipe => "Pipe",
            Self::Other => "Other",
            Self::Socket => "Socket",
        }
    }
}

impl fmt::Display for FdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One open descriptor at observation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdEntry {
    pub fd: u32,
    /// Resolved link target, or a placeholder when unreadable
    pub target: String,
    pub kind: FdKind,
}

impl FdEntry {
    /// Build an entry, classifying it from its number and target
    #[must_use]
    pub fn new(fd: u32, target: impl Into<String>) -> Self {
        let target = target.into();
        let kind = crate::classify::classify(fd, &target);
        Self { fd, target, kind }
    }
}

/// A process FD table as read at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FdSnapshot {
    /// Entries ordered by fd number
    pub entries: Vec<FdEntry>,
    pub taken_at: DateTime<Utc>,
}

impl FdSnapshot {
    #[must_use]
    pub fn new(mut entries: Vec<FdEntry>) -> Self {
        entries.sort_by_key(|e| e.fd);
        Self {
            entries,
            taken_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `Max open files` ceiling; `None` when unknown or unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub soft: Option<u64>,
    pub hard: Option<u64>,
}

impl ResourceLimits {
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            soft: None,
            hard: None,
        }
    }

    /// Soft and hard both set to `limit`, as applied to sandboxed children
    #[must_use]
    pub const fn fixed(limit: u64) -> Self {
        Self {
            soft: Some(limit),
            hard: Some(limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub name: String,
    pub user: String,
}

/// One row of the process listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    #[serde(flatten)]
    pub identity: ProcessIdentity,
    pub fd_count: usize,
}
