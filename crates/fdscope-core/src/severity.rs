//! Severity scoring of an FD table against its limits
//!
//! The thresholds are carried over unchanged from the first deployment of the
//! tool. They have never been tuned against real leak data and are kept as
//! named constants so they can be reviewed in one place.

use crate::types::{FdKind, FdSnapshot, ResourceLimits};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Usage of the soft limit (percent) at or above which a process is CRITICAL
pub const CRITICAL_USAGE_PCT: f64 = 90.0;

/// Usage of the soft limit (percent) at or above which a process is HIGH
pub const HIGH_USAGE_PCT: f64 = 70.0;

/// Absolute FD count at or above which a process is at least MEDIUM
pub const MEDIUM_TOTAL_FDS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        })
    }
}

/// Severity of one snapshot; recomputed, never stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityVerdict {
    pub level: SeverityLevel,
    /// Human-readable rationale for `level`
    pub reason: String,
    /// The numeric rule that fired, reproducible from the same inputs
    pub condition: String,
    pub type_counts: BTreeMap<FdKind, usize>,
    pub total: usize,
    pub non_standard_count: usize,
    /// Share of non-standard descriptors, in `[0, 1]`
    pub fd_density: f64,
    /// Percent of the soft limit in use, absent when the limit is unknown
    pub usage_pct: Option<f64>,
}

#[must_use]
pub fn evaluate(snapshot: &FdSnapshot, limits: &ResourceLimits) -> SeverityVerdict {
    let mut type_counts = BTreeMap::new();
    for entry in &snapshot.entries {
        *type_counts.entry(entry.kind).or_insert(0) += 1;
    }

    let total = snapshot.len();
    let standard = type_counts.get(&FdKind::Standard).copied().unwrap_or(0);
    let non_standard_count = total - standard;

    #[allow(clippy::cast_precision_loss)]
    let fd_density = if total == 0 {
        0.0
    } else {
        non_standard_count as f64 / total as f64
    };

    #[allow(clippy::cast_precision_loss)]
    let usage_pct = limits
        .soft
        .filter(|&soft| soft > 0)
        .map(|soft| 100.0 * total as f64 / soft as f64);

    let (level, reason, condition) = select_level(total, usage_pct);

    SeverityVerdict {
        level,
        reason: reason.to_owned(),
        condition,
        type_counts,
        total,
        non_standard_count,
        fd_density,
        usage_pct,
    }
}

fn select_level(total: usize, usage_pct: Option<f64>) -> (SeverityLevel, &'static str, String) {
    match usage_pct {
        Some(pct) if pct >= CRITICAL_USAGE_PCT => (
            SeverityLevel::Critical,
            "FD usage is extremely high and approaches the per-process soft limit.",
            format!("usage_pct={pct:.1} ≥ {CRITICAL_USAGE_PCT}"),
        ),
        Some(pct) if pct >= HIGH_USAGE_PCT => (
            SeverityLevel::High,
            "FD usage is significantly elevated relative to the soft limit.",
            format!("usage_pct={pct:.1} ≥ {HIGH_USAGE_PCT}"),
        ),
        _ if total >= MEDIUM_TOTAL_FDS => (
            SeverityLevel::Medium,
            "The absolute number of open descriptors is high compared to typical processes.",
            format!("total={total} ≥ {MEDIUM_TOTAL_FDS}"),
        ),
        Some(pct) => (
            SeverityLevel::Low,
            "The process keeps a controlled number of descriptors, well within its limit.",
            format!("total={total} < {MEDIUM_TOTAL_FDS}, usage_pct={pct:.1} < {HIGH_USAGE_PCT}"),
        ),
        None => (
            SeverityLevel::Low,
            "The process keeps a controlled number of descriptors; its limit is unknown.",
            format!("total={total} < {MEDIUM_TOTAL_FDS}, limit unknown"),
        ),
    }
}

/// Static risk explanation for one observed descriptor type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRisk {
    pub kind: FdKind,
    pub rank: u8,
    pub count: usize,
    pub reason: String,
}

#[must_use]
pub const fn risk_reason(kind: FdKind) -> &'static str {
    match kind {
        FdKind::Standard => {
            "stdin, stdout and stderr are always present and are managed by the OS."
        }
        FdKind::File => {
            "Regular files hold inode references and possibly locks, delaying release if leaked."
        }
        FdKind::Pipe => {
            "Pipes pin kernel buffers and IPC synchronization, so leaks weigh more under load."
        }
        FdKind::Other => {
            "Anonymous inodes and device objects have less predictable lifetimes."
        }
        FdKind::Socket => {
            "Sockets keep networking state, buffers and remote peers alive; leaks are the most costly."
        }
    }
}

/// Observed kinds with their static explanation, highest risk first
#[must_use]
pub fn risk_breakdown(type_counts: &BTreeMap<FdKind, usize>) -> Vec<TypeRisk> {
    type_counts
        .iter()
        .rev()
        .filter(|(_, count)| **count > 0)
        .map(|(&kind, &count)| TypeRisk {
            kind,
            rank: kind.risk_rank(),
            count,
            reason: risk_reason(kind).to_owned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FdEntry;

    fn snapshot_with(total: u32) -> FdSnapshot {
        FdSnapshot::new(
            (0..total)
                .map(|fd| FdEntry::new(fd, format!("/tmp/f{fd}")))
                .collect(),
        )
    }

    #[test]
    fn empty_table_is_low_with_zero_density() {
        let verdict = evaluate(&snapshot_with(0), &ResourceLimits::unknown());
        assert_eq!(verdict.level, SeverityLevel::Low);
        assert!(verdict.fd_density.abs() < f64::EPSILON);
        assert_eq!(verdict.usage_pct, None);
        assert_eq!(verdict.condition, "total=0 < 200, limit unknown");
    }

    #[test]
    fn thresholds_fire_top_down() {
        let limits = ResourceLimits::fixed(100);

        let v = evaluate(&snapshot_with(95), &limits);
        assert_eq!(v.level, SeverityLevel::Critical);
        assert_eq!(v.condition, "usage_pct=95.0 ≥ 90");

        let v = evaluate(&snapshot_with(90), &limits);
        assert_eq!(v.level, SeverityLevel::Critical);

        let v = evaluate(&snapshot_with(70), &limits);
        assert_eq!(v.level, SeverityLevel::High);
        assert_eq!(v.condition, "usage_pct=70.0 ≥ 70");

        let v = evaluate(&snapshot_with(69), &limits);
        assert_eq!(v.level, SeverityLevel::Low);
        assert_eq!(v.condition, "total=69 < 200, usage_pct=69.0 < 70");
    }

    #[test]
    fn absolute_count_without_limit_is_medium() {
        let v = evaluate(&snapshot_with(200), &ResourceLimits::unknown());
        assert_eq!(v.level, SeverityLevel::Medium);
        assert_eq!(v.condition, "total=200 ≥ 200");

        let v = evaluate(&snapshot_with(250), &ResourceLimits::fixed(65536));
        assert_eq!(v.level, SeverityLevel::Medium);
    }

    #[test]
    fn severity_is_monotonic_in_total() {
        for limits in [ResourceLimits::fixed(64), ResourceLimits::fixed(1024), ResourceLimits::unknown()] {
            let mut previous = SeverityLevel::Low;
            for total in (0..400).step_by(7) {
                let level = evaluate(&snapshot_with(total), &limits).level;
                assert!(level >= previous, "total={total} dropped to {level}");
                previous = level;
            }
        }
    }

    #[test]
    fn condition_is_reproducible() {
        let snap = snapshot_with(923);
        let limits = ResourceLimits::fixed(1000);
        let a = evaluate(&snap, &limits);
        let b = evaluate(&snap, &limits);
        assert_eq!(a.condition, "usage_pct=92.3 ≥ 90");
        assert_eq!(a, b);
    }

    #[test]
    fn density_and_counts() {
        let snap = FdSnapshot::new(vec![
            FdEntry::new(0, "/dev/null"),
            FdEntry::new(1, "pipe:[1]"),
            FdEntry::new(2, "pipe:[2]"),
            FdEntry::new(3, "socket:[3]"),
            FdEntry::new(4, "socket:[4]"),
            FdEntry::new(5, "/var/log/app.log"),
            FdEntry::new(6, "anon_inode:[eventfd]"),
            FdEntry::new(7, "pipe:[7]"),
        ]);
        let v = evaluate(&snap, &ResourceLimits::fixed(1024));
        assert_eq!(v.total, 8);
        assert_eq!(v.non_standard_count, 5);
        assert!((v.fd_density - 0.625).abs() < 1e-9);
        assert_eq!(v.type_counts[&FdKind::Standard], 3);
        assert_eq!(v.type_counts[&FdKind::Socket], 2);
        assert_eq!(v.type_counts[&FdKind::Pipe], 1);

        let breakdown = risk_breakdown(&v.type_counts);
        let kinds: Vec<FdKind> = breakdown.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![FdKind::Socket, FdKind::Other, FdKind::Pipe, FdKind::File, FdKind::Standard]
        );
        assert_eq!(breakdown[0].count, 2);
        assert_eq!(breakdown[0].rank, 5);
    }
}
