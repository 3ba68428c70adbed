//! Process-group isolation of sandboxed children
//!
//! A child is started as the leader of a new process group, so the whole
//! group (the child and anything it forks) can be killed at once without
//! touching unrelated processes. The group id is the child's pid and is only
//! signalled while the leader is still unreaped, which keeps the id from being
//! recycled underneath us.

use crate::{FdscopeError, Result};
use nix::errno::Errno;
use nix::sys::resource::{Resource, setrlimit};
use nix::sys::signal::{Signal, killpg};
use nix::sys::wait::{Id, WaitPidFlag, WaitStatus, waitid};
use nix::unistd::Pid;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// Poll period while waiting for a group leader to exit
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long output readers may lag behind the reap
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// A program to start in its own process group
#[derive(Debug, Clone)]
pub struct Launch {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    /// File fed to the program's stdin; `/dev/null` when absent
    pub stdin: Option<PathBuf>,
    /// `RLIMIT_NOFILE` (soft and hard) in force before the program's first instruction
    pub fd_limit: Option<u64>,
    /// Bytes of each output stream to keep
    pub output_cap: usize,
}

/// How a reaped group leader ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitOutcome {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Exit status, or the negated signal number for signal deaths
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.code.or_else(|| self.signal.map(|sig| -sig))
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

/// Result of reaping a group leader
#[derive(Debug, Clone)]
pub struct Reaped {
    pub outcome: ExitOutcome,
    pub stdout: String,
    pub stderr: String,
}

pub trait GroupLeader {
    fn pid(&self) -> u32;
}

/// Capability to run programs in isolated process groups
pub trait ProcessGroups {
    type Child: GroupLeader;

    /// Start `launch` as the leader of a fresh process group
    fn spawn_isolated(&self, launch: &Launch) -> Result<Self::Child>;

    /// Wait up to `timeout` for the leader to exit, leaving it unreaped.
    /// Returns `false` on timeout.
    fn wait_exit(&self, child: &mut Self::Child, timeout: Duration) -> Result<bool>;

    /// SIGKILL every member of the child's group
    fn kill_group(&self, child: &Self::Child) -> Result<()>;

    /// Collect the leader's exit status and captured output
    fn reap(&self, child: Self::Child) -> Result<Reaped>;
}

/// Process groups via `setpgid`, `killpg` and `waitid`
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixGroups;

/// Leader of a group created by [`PosixGroups`]
#[derive(Debug)]
pub struct PosixChild {
    child: Child,
    pgid: Pid,
    stdout: Option<Receiver<String>>,
    stderr: Option<Receiver<String>>,
    reaped: bool,
}

impl GroupLeader for PosixChild {
    fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl PosixChild {
    fn kill_group(&self) -> Result<()> {
        match killpg(self.pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for PosixChild {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        tracing::warn!(pgid = self.pgid.as_raw(), "group leader dropped unreaped, killing group");
        if let Err(e) = self.kill_group() {
            tracing::error!(pgid = self.pgid.as_raw(), error = %e, "failed to kill process group");
        }
        let _ = self.child.wait();
    }
}

impl ProcessGroups for PosixGroups {
    type Child = PosixChild;

    fn spawn_isolated(&self, launch: &Launch) -> Result<PosixChild> {
        let stdin = match &launch.stdin {
            Some(path) => Stdio::from(File::open(path)?),
            None => Stdio::null(),
        };

        let mut command = Command::new(&launch.program);
        command
            .args(&launch.args)
            .current_dir(&launch.cwd)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        if let Some(limit) = launch.fd_limit {
            // SAFETY: setrlimit is async-signal-safe and the closure allocates nothing
            unsafe {
                command.pre_exec(move || {
                    setrlimit(Resource::RLIMIT_NOFILE, limit, limit).map_err(io::Error::from)
                });
            }
        }

        let mut child = command.spawn().map_err(|e| {
            FdscopeError::SpawnFailed(format!("{}: {e}", launch.program.display()))
        })?;

        let pgid = Pid::from_raw(i32::try_from(child.id()).map_err(|_| {
            FdscopeError::SpawnFailed(format!("pid {} out of range", child.id()))
        })?);
        let stdout = child.stdout.take().map(|s| drain(s, launch.output_cap));
        let stderr = child.stderr.take().map(|s| drain(s, launch.output_cap));

        tracing::debug!(
            pid = child.id(),
            program = %launch.program.display(),
            fd_limit = ?launch.fd_limit,
            "spawned group leader"
        );

        Ok(PosixChild {
            child,
            pgid,
            stdout,
            stderr,
            reaped: false,
        })
    }

    fn wait_exit(&self, child: &mut PosixChild, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG | WaitPidFlag::WNOWAIT;

        loop {
            match waitid(Id::Pid(child.pgid), flags) {
                Ok(WaitStatus::StillAlive) | Err(Errno::EINTR) => {}
                Ok(_) => return Ok(true),
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    fn kill_group(&self, child: &PosixChild) -> Result<()> {
        child.kill_group()
    }

    fn reap(&self, mut child: PosixChild) -> Result<Reaped> {
        let status = child.child.wait()?;
        child.reaped = true;

        Ok(Reaped {
            outcome: ExitOutcome::from(status),
            stdout: collect(child.stdout.take()),
            stderr: collect(child.stderr.take()),
        })
    }
}

/// Read `stream` to EOF on a helper thread, keeping at most `cap` bytes
fn drain(mut stream: impl Read + Send + 'static, cap: usize) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let mut kept = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let room = cap.saturating_sub(kept.len());
                    kept.extend_from_slice(&buf[..n.min(room)]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        let _ = tx.send(String::from_utf8_lossy(&kept).into_owned());
    });

    rx
}

fn collect(rx: Option<Receiver<String>>) -> String {
    rx.and_then(|rx| match rx.recv_timeout(OUTPUT_DRAIN_GRACE) {
        Ok(output) => Some(output),
        Err(_) => {
            tracing::warn!("output stream still held open after reap, dropping it");
            None
        }
    })
    .unwrap_or_default()
}
