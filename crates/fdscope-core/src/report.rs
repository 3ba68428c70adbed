//! Execution report assembly

use crate::inspector::FdAnalysis;
use crate::result::ExecutionMetadata;
use crate::types::{FdSnapshot, ResourceLimits};
use serde::{Deserialize, Serialize};

/// FD count of the sandboxed program at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FdGrowthSample {
    /// Seconds since the first successful sample
    pub time_sec: f64,
    pub fd_count: usize,
}

/// Everything known about one sandboxed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub execution: ExecutionMetadata,

    /// Samples in increasing `time_sec`, the first at 0
    pub fd_growth: Vec<FdGrowthSample>,

    /// Last table observed before the program exited or was killed;
    /// absent when no sample succeeded
    pub fd_analysis: Option<FdAnalysis>,
}

impl ExecutionReport {
    /// Compose a report. The final snapshot is scored exactly as a live
    /// process would be.
    #[must_use]
    pub fn build(
        execution: ExecutionMetadata,
        fd_growth: Vec<FdGrowthSample>,
        final_snapshot: Option<FdSnapshot>,
        limits: ResourceLimits,
    ) -> Self {
        let fd_analysis = final_snapshot.map(|snapshot| FdAnalysis::score(snapshot, limits));
        Self {
            execution,
            fd_growth,
            fd_analysis,
        }
    }

    /// Highest FD count seen in the growth series
    #[must_use]
    pub fn peak_fd_count(&self) -> Option<usize> {
        self.fd_growth.iter().map(|s| s.fd_count).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Language;
    use crate::result::TerminationReason;
    use crate::severity;
    use crate::types::FdEntry;

    fn metadata() -> ExecutionMetadata {
        ExecutionMetadata {
            pid: Some(4321),
            duration_seconds: 0.25,
            termination_reason: TerminationReason::Normal,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            language: Language::Python,
            timeout_secs: 30.0,
            fd_limit: 16,
            fd_limit_exceeded: false,
            sampling_started_at: None,
            snapshot_taken_at: None,
        }
    }

    #[test]
    fn scores_final_snapshot_like_a_live_process() {
        let snapshot = FdSnapshot::new(
            (0..15)
                .map(|fd| FdEntry::new(fd, format!("/tmp/{fd}")))
                .collect(),
        );
        let limits = ResourceLimits::fixed(16);

        let report = ExecutionReport::build(metadata(), Vec::new(), Some(snapshot.clone()), limits);
        let analysis = report.fd_analysis.unwrap();
        assert_eq!(analysis.verdict, severity::evaluate(&snapshot, &limits));
        assert_eq!(analysis, FdAnalysis::score(snapshot, limits));
    }

    #[test]
    fn missing_snapshot_yields_no_analysis() {
        let growth = vec![
            FdGrowthSample { time_sec: 0.0, fd_count: 3 },
            FdGrowthSample { time_sec: 0.1, fd_count: 9 },
        ];
        let report = ExecutionReport::build(metadata(), growth, None, ResourceLimits::fixed(16));
        assert!(report.fd_analysis.is_none());
        assert_eq!(report.peak_fd_count(), Some(9));
    }
}
