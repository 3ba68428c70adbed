//! Sandboxed execution of an uploaded program
//!
//! One run owns its workspace, child, process group and sampler. Program
//! misbehaviour (non-zero exit, FD exhaustion, timeout, compile errors) ends
//! in a report; only bad configuration and workspace I/O are returned as
//! errors.

use crate::config::{ExecutionConfig, Language};
use crate::procfs::{ProcFs, ProcessTable};
use crate::report::ExecutionReport;
use crate::result::{ExecutionMetadata, TerminationReason, mentions_fd_exhaustion, round_millis};
use crate::sandbox::group::{GroupLeader, Launch, PosixGroups, ProcessGroups, Reaped};
use crate::sandbox::phase::RunPhase;
use crate::sandbox::sampler::{FdSampler, SAMPLE_INTERVAL};
use crate::types::ResourceLimits;
use crate::upload::SourceUpload;
use crate::Result;
use chrono::Utc;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Name of the compiled binary inside the run workspace
const BINARY_NAME: &str = "program";

/// Private directory holding one run's source and build output
#[derive(Debug)]
struct Workspace {
    dir: TempDir,
    source: PathBuf,
}

impl Workspace {
    fn create(source: &str, language: Language) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("fdscope-run-").tempdir()?;
        let path = dir.path().join(language.source_file_name());
        fs::write(&path, source)?;
        Ok(Self { dir, source: path })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Launch for the program itself, under the configured FD ceiling
fn program_launch(
    program: PathBuf,
    args: Vec<OsString>,
    workspace: &Workspace,
    config: &ExecutionConfig,
) -> Launch {
    Launch {
        program,
        args,
        cwd: workspace.path().to_path_buf(),
        stdin: None,
        fd_limit: Some(config.fd_limit),
        output_cap: config.output_cap,
    }
}

/// Outcome of the C compile step
enum Compiled {
    Binary(PathBuf),
    Failed { stdout: String, stderr: String },
    SpawnFailed(String),
}

/// Runs untrusted sources in isolated process groups
#[derive(Debug, Clone, Default)]
pub struct SandboxExecutor<T = ProcFs, G = PosixGroups> {
    table: T,
    groups: G,
    sample_interval: Option<Duration>,
}

impl SandboxExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T, G> SandboxExecutor<T, G>
where
    T: ProcessTable + Clone + Send + 'static,
    G: ProcessGroups,
{
    pub fn with_parts(table: T, groups: G) -> Self {
        Self {
            table,
            groups,
            sample_interval: None,
        }
    }

    /// Override the sampling period
    #[must_use]
    pub fn sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = Some(interval);
        self
    }

    /// Validate an upload, then run it with `config` (its language comes from the file name)
    pub fn execute_upload(
        &self,
        filename: &str,
        content: Vec<u8>,
        config: &ExecutionConfig,
    ) -> Result<ExecutionReport> {
        let upload = SourceUpload::validate(filename, content)?;
        let config = ExecutionConfig {
            language: upload.language,
            ..config.clone()
        };
        self.execute(&upload.source, &config)
    }

    /// Run `source` under `config` and report on it
    pub fn execute(&self, source: &str, config: &ExecutionConfig) -> Result<ExecutionReport> {
        config.validate()?;

        let started = Instant::now();
        let mut phase = RunPhase::Preparing;
        let workspace = Workspace::create(source, config.language)?;

        tracing::info!(
            language = %config.language,
            timeout_secs = config.timeout.as_secs_f64(),
            fd_limit = config.fd_limit,
            workspace = %workspace.path().display(),
            "sandboxed run prepared"
        );

        let launch = match config.language {
            Language::Python => program_launch(
                config.python_path.clone(),
                vec![workspace.source.clone().into_os_string()],
                &workspace,
                config,
            ),
            Language::C => {
                phase = phase.advance(RunPhase::Compiling);
                match self.compile(&workspace, config)? {
                    Compiled::Binary(binary) => program_launch(binary, Vec::new(), &workspace, config),
                    Compiled::Failed { stdout, stderr } => {
                        let phase = phase.advance(RunPhase::CompileFailed);
                        tracing::info!(%phase, duration_ms = started.elapsed().as_millis(), "compilation failed");
                        return Ok(Self::not_run(
                            config,
                            started,
                            TerminationReason::CompileError,
                            stdout,
                            stderr,
                        ));
                    }
                    Compiled::SpawnFailed(diagnostic) => {
                        let phase = phase.advance(RunPhase::Errored);
                        tracing::info!(%phase, "run ended before execution");
                        return Ok(Self::not_run(
                            config,
                            started,
                            TerminationReason::Error,
                            String::new(),
                            diagnostic,
                        ));
                    }
                }
            }
        };

        let report = self.run(&launch, config, phase, started);
        drop(workspace);
        report
    }

    fn compile(&self, workspace: &Workspace, config: &ExecutionConfig) -> Result<Compiled> {
        let binary = workspace.path().join(BINARY_NAME);
        let launch = Launch {
            program: config.cc_path.clone(),
            args: vec![
                workspace.source.clone().into_os_string(),
                "-o".into(),
                binary.clone().into_os_string(),
            ],
            cwd: workspace.path().to_path_buf(),
            stdin: None,
            fd_limit: None,
            output_cap: config.output_cap,
        };

        let mut child = match self.groups.spawn_isolated(&launch) {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(error = %e, "compiler could not be started");
                return Ok(Compiled::SpawnFailed(e.to_string()));
            }
        };

        let exited = self.groups.wait_exit(&mut child, config.compile_timeout)?;
        self.groups.kill_group(&child)?;
        let Reaped {
            outcome,
            stdout,
            mut stderr,
        } = self.groups.reap(child)?;

        if !exited {
            tracing::warn!(timeout_secs = config.compile_timeout.as_secs_f64(), "compilation timed out");
            stderr.push_str(&format!(
                "\ncompilation timed out after {:.1}s",
                config.compile_timeout.as_secs_f64()
            ));
            return Ok(Compiled::Failed { stdout, stderr });
        }
        if !outcome.success() {
            return Ok(Compiled::Failed { stdout, stderr });
        }

        tracing::debug!(binary = %binary.display(), "compiled");
        Ok(Compiled::Binary(binary))
    }

    fn run(
        &self,
        launch: &Launch,
        config: &ExecutionConfig,
        phase: RunPhase,
        started: Instant,
    ) -> Result<ExecutionReport> {
        let phase = phase.advance(RunPhase::Running);
        let limits = ResourceLimits::fixed(config.fd_limit);

        let mut child = match self.groups.spawn_isolated(launch) {
            Ok(child) => child,
            Err(e) => {
                let phase = phase.advance(RunPhase::Errored);
                tracing::warn!(%phase, error = %e, "program could not be started");
                return Ok(Self::not_run(
                    config,
                    started,
                    TerminationReason::Error,
                    String::new(),
                    e.to_string(),
                ));
            }
        };

        let pid = child.pid();
        let sampling_started_at = Utc::now();
        let sampler = FdSampler::start(
            self.table.clone(),
            pid,
            self.sample_interval.unwrap_or(SAMPLE_INTERVAL),
        );
        tracing::info!(pid, fd_limit = config.fd_limit, "program started");

        let waited = self.groups.wait_exit(&mut child, config.timeout);

        // Stop sampling at the same point the group is killed; a read in flight finishes
        sampler.request_stop();
        let killed = self.groups.kill_group(&child);
        let log = sampler.stop();
        let reaped = self.groups.reap(child)?;
        killed?;

        let (reason, exit_code, diagnostic) = match waited {
            Ok(true) if reaped.outcome.success() => (TerminationReason::Normal, Some(0), None),
            Ok(true) => (TerminationReason::Error, reaped.outcome.exit_code(), None),
            Ok(false) => {
                tracing::warn!(pid, timeout_secs = config.timeout.as_secs_f64(), "run timed out, group killed");
                (TerminationReason::Timeout, None, None)
            }
            Err(e) => {
                tracing::error!(pid, error = %e, "waiting for program failed, group killed");
                (TerminationReason::Error, None, Some(e.to_string()))
            }
        };
        let phase = phase.advance(RunPhase::terminal_for(reason));

        let mut stderr = reaped.stderr;
        if let Some(diagnostic) = diagnostic {
            stderr.push_str(&diagnostic);
        }

        let fd_limit_exceeded = mentions_fd_exhaustion(&reaped.stdout, &stderr);
        if fd_limit_exceeded {
            tracing::warn!(pid, fd_limit = config.fd_limit, "fd limit violation detected");
        }

        let duration_seconds = round_millis(started.elapsed().as_secs_f64());
        tracing::info!(
            pid,
            %phase,
            duration_seconds,
            reason = %reason,
            samples = log.samples.len(),
            "run finished"
        );

        let execution = ExecutionMetadata {
            pid: Some(pid),
            duration_seconds,
            termination_reason: reason,
            exit_code,
            stdout: reaped.stdout,
            stderr,
            language: config.language,
            timeout_secs: config.timeout.as_secs_f64(),
            fd_limit: config.fd_limit,
            fd_limit_exceeded,
            sampling_started_at: Some(sampling_started_at),
            snapshot_taken_at: log.last_snapshot.as_ref().map(|s| s.taken_at),
        };

        Ok(ExecutionReport::build(
            execution,
            log.samples,
            log.last_snapshot,
            limits,
        ))
    }

    /// Report for a run whose program never started
    fn not_run(
        config: &ExecutionConfig,
        started: Instant,
        reason: TerminationReason,
        stdout: String,
        stderr: String,
    ) -> ExecutionReport {
        let execution = ExecutionMetadata {
            pid: None,
            duration_seconds: round_millis(started.elapsed().as_secs_f64()),
            termination_reason: reason,
            exit_code: None,
            stdout,
            stderr,
            language: config.language,
            timeout_secs: config.timeout.as_secs_f64(),
            fd_limit: config.fd_limit,
            fd_limit_exceeded: false,
            sampling_started_at: None,
            snapshot_taken_at: None,
        };
        ExecutionReport::build(execution, Vec::new(), None, ResourceLimits::fixed(config.fd_limit))
    }
}
