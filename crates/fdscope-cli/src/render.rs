//! Plain-text rendering of reports

use fdscope_core::inspector::FdAnalysis;
use fdscope_core::{ExecutionReport, ProcessAnalysis, ProcessSummary};
use std::fmt::Write;

/// Widest target shown per descriptor row
const TARGET_WIDTH: usize = 72;

pub fn process_table(processes: &[ProcessSummary]) -> String {
    let mut out = format!("{:>8}  {:>8}  {:<16}  {}\n", "PID", "FDS", "USER", "NAME");
    for p in processes {
        let _ = writeln!(
            out,
            "{:>8}  {:>8}  {:<16}  {}",
            p.identity.pid, p.fd_count, p.identity.user, p.identity.name
        );
    }
    out
}

pub fn process_analysis(analysis: &ProcessAnalysis) -> String {
    let mut out = format!(
        "{} (pid {}, user {}) at {}\n",
        analysis.identity.name,
        analysis.identity.pid,
        analysis.identity.user,
        analysis.snapshot_taken_at.to_rfc3339()
    );
    fd_analysis(&mut out, &analysis.analysis);
    out
}

pub fn execution_report(report: &ExecutionReport) -> String {
    let e = &report.execution;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} run: {} in {:.3}s (exit code {})",
        e.language,
        e.termination_reason,
        e.duration_seconds,
        e.exit_code.map_or_else(|| "none".to_owned(), |c| c.to_string())
    );
    let _ = writeln!(
        out,
        "timeout {:.1}s, fd limit {}{}",
        e.timeout_secs,
        e.fd_limit,
        if e.fd_limit_exceeded { ", fd limit EXCEEDED" } else { "" }
    );

    if !report.fd_growth.is_empty() {
        let _ = writeln!(
            out,
            "fd growth: {} samples, peak {}",
            report.fd_growth.len(),
            report.peak_fd_count().unwrap_or(0)
        );
        for sample in &report.fd_growth {
            let _ = writeln!(out, "  t={:>7.3}s  fds={}", sample.time_sec, sample.fd_count);
        }
    }

    match &report.fd_analysis {
        Some(analysis) => fd_analysis(&mut out, analysis),
        None => out.push_str("no fd snapshot was captured\n"),
    }

    section(&mut out, "stdout", &e.stdout);
    section(&mut out, "stderr", &e.stderr);
    out
}

fn fd_analysis(out: &mut String, analysis: &FdAnalysis) {
    let v = &analysis.verdict;
    let limit = analysis
        .limits
        .soft
        .map_or_else(|| "unknown".to_owned(), |l| l.to_string());
    let _ = writeln!(out, "severity {} ({})", v.level, v.condition);
    let _ = writeln!(out, "  {}", v.reason);
    let _ = writeln!(
        out,
        "total {} / limit {}, non-standard {}, density {:.2}",
        v.total, limit, v.non_standard_count, v.fd_density
    );

    out.push_str("risk by type:\n");
    for risk in &analysis.risk {
        let _ = writeln!(out, "  [{}] {:<8} {:>6}  {}", risk.rank, risk.kind.as_str(), risk.count, risk.reason);
    }

    out.push_str("findings:\n");
    for line in &analysis.interpretation {
        let _ = writeln!(out, "  - {line}");
    }

    out.push_str("descriptors:\n");
    for entry in &analysis.snapshot.entries {
        let _ = writeln!(out, "  {:>5}  {:<8}  {}", entry.fd, entry.kind.as_str(), truncate(&entry.target));
    }
}

fn section(out: &mut String, name: &str, body: &str) {
    if body.is_empty() {
        return;
    }
    let _ = writeln!(out, "--- {name} ---");
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
}

fn truncate(target: &str) -> String {
    if target.chars().count() <= TARGET_WIDTH {
        return target.to_owned();
    }
    let kept: String = target.chars().take(TARGET_WIDTH - 3).collect();
    format!("{kept}...")
}
