//! End-to-end sandbox runs against real interpreters and compilers.
//! Each scenario returns early when its toolchain is not installed.

use fdscope_core::inspector::FdAnalysis;
use fdscope_core::{ExecutionConfig, FdscopeError, Language, SandboxExecutor, TerminationReason};
use nix::errno::Errno;
use nix::sys::signal::killpg;
use nix::unistd::Pid;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

fn available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn config(language: Language, timeout: Duration, fd_limit: u64) -> ExecutionConfig {
    ExecutionConfig::builder()
        .language(language)
        .timeout(timeout)
        .fd_limit(fd_limit)
        .build()
        .unwrap()
}

#[test]
fn busy_loop_is_killed_at_the_timeout() {
    if !available("python3") {
        return;
    }

    let started = Instant::now();
    let report = SandboxExecutor::new()
        .execute(
            "while True:\n    pass\n",
            &config(Language::Python, Duration::from_secs(1), 64),
        )
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    let execution = &report.execution;
    assert_eq!(execution.termination_reason, TerminationReason::Timeout);
    assert_eq!(execution.exit_code, None);
    assert!(execution.duration_seconds >= 1.0);

    let pgid = Pid::from_raw(i32::try_from(execution.pid.unwrap()).unwrap());
    assert_eq!(killpg(pgid, None), Err(Errno::ESRCH));

    // The loop was observed while it ran
    assert!(!report.fd_growth.is_empty());
    assert!(report.fd_analysis.is_some());
}

#[test]
fn fd_exhaustion_is_reported() {
    if !available("python3") {
        return;
    }

    let source = "import os\nfds = []\nwhile True:\n    fds.append(os.open('/dev/null', os.O_RDONLY))\n";
    let report = SandboxExecutor::new()
        .execute(source, &config(Language::Python, Duration::from_secs(10), 10))
        .unwrap();

    let execution = &report.execution;
    assert_eq!(execution.termination_reason, TerminationReason::Error);
    assert!(execution.fd_limit_exceeded);
    assert!(execution.stderr.contains("Too many open files"));
    assert_eq!(execution.fd_limit, 10);

    if let Some(analysis) = &report.fd_analysis {
        assert!(analysis.snapshot.len() <= 10);
        assert_eq!(analysis.limits.soft, Some(10));
    }
}

#[test]
fn python_growth_starts_at_zero_and_scores_like_a_live_process() {
    if !available("python3") {
        return;
    }

    let source = "import time\nfiles = [open('/dev/null') for _ in range(20)]\ntime.sleep(0.5)\nprint('done')\n";
    let report = SandboxExecutor::new()
        .execute(source, &config(Language::Python, Duration::from_secs(10), 64))
        .unwrap();

    let execution = &report.execution;
    assert_eq!(execution.termination_reason, TerminationReason::Normal);
    assert_eq!(execution.exit_code, Some(0));
    assert_eq!(execution.stdout.trim(), "done");
    assert!(!execution.fd_limit_exceeded);

    assert!(report.fd_growth[0].time_sec.abs() < f64::EPSILON);
    assert!(report.fd_growth.windows(2).all(|w| w[0].time_sec < w[1].time_sec));
    assert!(report.peak_fd_count().unwrap() >= 23);

    let analysis = report.fd_analysis.unwrap();
    assert_eq!(
        analysis,
        FdAnalysis::score(analysis.snapshot.clone(), analysis.limits)
    );
    assert_eq!(execution.snapshot_taken_at, Some(analysis.snapshot.taken_at));
}

#[test]
fn compile_error_never_runs() {
    if !available("gcc") {
        return;
    }

    let report = SandboxExecutor::new()
        .execute(
            "int main( {\n",
            &config(Language::C, Duration::from_secs(5), 64),
        )
        .unwrap();

    let execution = &report.execution;
    assert_eq!(execution.termination_reason, TerminationReason::CompileError);
    assert_eq!(execution.pid, None);
    assert_eq!(execution.exit_code, None);
    assert!(!execution.stderr.is_empty());
    assert!(report.fd_growth.is_empty());
    assert!(report.fd_analysis.is_none());
}

#[test]
fn compiled_program_runs_under_the_ceiling() {
    if !available("gcc") {
        return;
    }

    let source = r#"
#include <fcntl.h>
#include <stdio.h>
#include <unistd.h>

int main(void) {
    for (int i = 0; i < 5; i++) {
        open("/dev/null", O_RDONLY);
    }
    usleep(300000);
    printf("opened\n");
    return 0;
}
"#;
    let report = SandboxExecutor::new()
        .execute_upload(
            "leak.c",
            source.as_bytes().to_vec(),
            &config(Language::Python, Duration::from_secs(10), 32),
        )
        .unwrap();

    let execution = &report.execution;
    assert_eq!(execution.language, Language::C);
    assert_eq!(execution.termination_reason, TerminationReason::Normal);
    assert_eq!(execution.stdout, "opened\n");
    assert!(report.fd_analysis.is_some());
}

#[test]
fn rejected_inputs_never_spawn() {
    let executor = SandboxExecutor::new();
    let cfg = config(Language::Python, Duration::from_secs(1), 8);

    assert!(matches!(
        executor.execute_upload("notes.txt", b"hello".to_vec(), &cfg),
        Err(FdscopeError::InvalidUpload(_))
    ));
    assert!(matches!(
        executor.execute_upload("bad.py", vec![0xff, 0xfe], &cfg),
        Err(FdscopeError::InvalidUpload(_))
    ));
    assert!(matches!(
        ExecutionConfig::builder().fd_limit(0).build(),
        Err(FdscopeError::InvalidConfig(_))
    ));
}
