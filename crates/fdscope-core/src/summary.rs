//! Prose summaries of finished reports
//!
//! Summarizing is best effort. Whatever goes wrong, callers get
//! [`FALLBACK_SUMMARY`] and the report itself is left untouched.

use crate::sandbox::group::{Launch, PosixGroups, ProcessGroups};
use crate::{FdscopeError, Result};
use serde::Serialize;
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Returned whenever no summary could be produced
pub const FALLBACK_SUMMARY: &str =
    "Summary unavailable. Configure a summarizer command to enable report summaries.";

/// Default bound on one summarizer invocation
pub const DEFAULT_SUMMARY_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes of summarizer output kept
const SUMMARY_OUTPUT_CAP: usize = 64 * 1024;

/// Turns a JSON-serialized report into prose
pub trait Summarizer {
    fn summarize(&self, report_json: &str) -> Result<String>;
}

/// Pipes the report into an external command and reads the summary from its stdout.
///
/// The command runs as the leader of its own process group; when it exits or
/// times out the whole group is killed and reaped before `summarize` returns.
#[derive(Debug, Clone)]
pub struct CommandSummarizer {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl CommandSummarizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_SUMMARY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Summarizer for CommandSummarizer {
    fn summarize(&self, report_json: &str) -> Result<String> {
        let mut input = NamedTempFile::with_prefix("fdscope-report-")?;
        input.write_all(report_json.as_bytes())?;
        input.flush()?;

        let launch = Launch {
            program: self.program.clone(),
            args: self.args.clone(),
            cwd: std::env::temp_dir(),
            stdin: Some(input.path().to_path_buf()),
            fd_limit: None,
            output_cap: SUMMARY_OUTPUT_CAP,
        };

        let groups = PosixGroups;
        let mut child = groups.spawn_isolated(&launch)?;
        let exited = groups.wait_exit(&mut child, self.timeout)?;
        groups.kill_group(&child)?;
        let reaped = groups.reap(child)?;

        if !exited {
            return Err(FdscopeError::SpawnFailed(format!(
                "summarizer timed out after {:.1}s",
                self.timeout.as_secs_f64()
            )));
        }
        if !reaped.outcome.success() {
            return Err(FdscopeError::SpawnFailed(format!(
                "summarizer exited with {:?}",
                reaped.outcome.exit_code()
            )));
        }

        let summary = reaped.stdout.trim().to_owned();
        if summary.is_empty() {
            return Err(FdscopeError::SpawnFailed("summarizer produced no output".into()));
        }
        Ok(summary)
    }
}

/// Summarize `report`, degrading to [`FALLBACK_SUMMARY`] on any failure
pub fn summarize_or_fallback<S, R>(summarizer: Option<&S>, report: &R) -> String
where
    S: Summarizer + ?Sized,
    R: Serialize,
{
    let Some(summarizer) = summarizer else {
        return FALLBACK_SUMMARY.to_owned();
    };

    let json = match serde_json::to_string_pretty(report) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, "report could not be serialized for summarizing");
            return FALLBACK_SUMMARY.to_owned();
        }
    };

    match summarizer.summarize(&json) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(error = %e, "summarizer failed, using fallback");
            FALLBACK_SUMMARY.to_owned()
        }
    }
}
