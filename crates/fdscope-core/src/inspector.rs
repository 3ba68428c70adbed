//! Point-in-time forensic report of a live process

use crate::procfs::{ProcFs, ProcessTable};
use crate::severity::{self, SeverityVerdict, TypeRisk};
use crate::types::{FdKind, FdSnapshot, ProcessIdentity, ProcessSummary, ResourceLimits};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scored view of one FD table, shared by live-process and sandbox reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FdAnalysis {
    pub snapshot: FdSnapshot,
    pub limits: ResourceLimits,
    pub verdict: SeverityVerdict,
    pub interpretation: Vec<String>,
    pub risk: Vec<TypeRisk>,
}

impl FdAnalysis {
    /// Score `snapshot` against `limits`
    #[must_use]
    pub fn score(snapshot: FdSnapshot, limits: ResourceLimits) -> Self {
        let verdict = severity::evaluate(&snapshot, &limits);
        let interpretation = interpret(&verdict);
        let risk = severity::risk_breakdown(&verdict.type_counts);
        Self {
            snapshot,
            limits,
            verdict,
            interpretation,
            risk,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessAnalysis {
    pub identity: ProcessIdentity,
    #[serde(flatten)]
    pub analysis: FdAnalysis,
    pub snapshot_taken_at: DateTime<Utc>,
}

/// Composes the process table with classification and scoring
#[derive(Debug, Clone, Default)]
pub struct ProcessInspector<T = ProcFs> {
    table: T,
}

impl ProcessInspector {
    /// Inspector over the host's `/proc`
    #[must_use]
    pub fn procfs() -> Self {
        Self::new(ProcFs::default())
    }
}

impl<T: ProcessTable> ProcessInspector<T> {
    pub const fn new(table: T) -> Self {
        Self { table }
    }

    pub fn list_processes(&self) -> Result<Vec<ProcessSummary>> {
        self.table.list_processes()
    }

    /// Full report for `pid`; inspection errors are returned unchanged
    pub fn analyze(&self, pid: u32) -> Result<ProcessAnalysis> {
        let identity = self.table.read_identity(pid)?;
        let snapshot = self.table.read_fd_snapshot(pid)?;
        let limits = self.table.read_limits(pid)?;
        let snapshot_taken_at = snapshot.taken_at;

        let analysis = FdAnalysis::score(snapshot, limits);

        tracing::debug!(
            pid,
            total = analysis.verdict.total,
            level = %analysis.verdict.level,
            "process analyzed"
        );

        Ok(ProcessAnalysis {
            identity,
            analysis,
            snapshot_taken_at,
        })
    }
}

/// Findings derived from a verdict, in a fixed order
#[must_use]
pub fn interpret(verdict: &SeverityVerdict) -> Vec<String> {
    let total = verdict.total;
    let count = |kind| verdict.type_counts.get(&kind).copied().unwrap_or(0);

    let footprint = match total {
        0..50 => {
            "The process has a very small descriptor footprint, typical of short-lived or idle programs."
        }
        50..100 => "The process shows low descriptor usage, common for lightweight background services.",
        100..150 => "Descriptor usage is moderate and consistent with normal file and IPC activity.",
        150..200 => {
            "The process holds a moderately high number of descriptors, indicating sustained kernel interaction."
        }
        _ => "The process exhibits very high descriptor usage, typical of browsers, IDEs or core services.",
    };

    let mut lines = vec![
        footprint.to_owned(),
        format!(
            "{} out of {total} descriptors are non-standard and correspond to kernel-managed resources.",
            verdict.non_standard_count
        ),
    ];

    let sockets = count(FdKind::Socket);
    let pipes = count(FdKind::Pipe);
    if sockets + pipes > 0 {
        lines.push(format!(
            "{sockets} socket(s) and {pipes} pipe(s) are open; these retain more kernel state than regular files and carry higher forensic risk."
        ));
    } else if count(FdKind::File) > 0 {
        lines.push(
            "Non-standard descriptors are dominated by regular files, which retain less kernel state than sockets or pipes."
                .to_owned(),
        );
    }

    lines.push(
        "High descriptor usage does not by itself indicate a leak, but it increases the impact if descriptors are not released."
            .to_owned(),
    );

    lines
}
