//! Process state from the proc pseudo-filesystem
//!
//! Every read goes to the kernel; nothing is cached between calls.
//! - `ProcessTable` - the read-only view the inspector and sampler depend on
//! - `ProcFs` - implementation over a proc mount (normally `/proc`)
//! - `parse` - text formats of `limits`, `status` and `stat`

pub mod parse;

use crate::classify::UNREADABLE_TARGET;
use crate::types::{FdEntry, FdSnapshot, ProcessIdentity, ProcessSummary, ResourceLimits};
use crate::{FdscopeError, Result};
use nix::unistd::{Uid, User};
use std::fs;
use std::path::PathBuf;

/// Read-only view of the OS process table
pub trait ProcessTable {
    /// All live processes with their open FD count, most descriptors first
    fn list_processes(&self) -> Result<Vec<ProcessSummary>>;

    /// Current FD table of `pid`
    fn read_fd_snapshot(&self, pid: u32) -> Result<FdSnapshot>;

    /// `Max open files` limits of `pid`
    fn read_limits(&self, pid: u32) -> Result<ResourceLimits>;

    fn read_identity(&self, pid: u32) -> Result<ProcessIdentity>;
}

/// Proc filesystem mounted at `root`
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::with_root("/proc")
    }
}

impl ProcFs {
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pid_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn read_pid_file(&self, pid: u32, name: &str) -> Result<String> {
        fs::read_to_string(self.pid_dir(pid).join(name))
            .map_err(|e| FdscopeError::from_proc_io(pid, e))
    }

    fn fd_count(&self, pid: u32) -> Result<usize> {
        let listing = fs::read_dir(self.pid_dir(pid).join("fd"))
            .map_err(|e| FdscopeError::from_proc_io(pid, e))?;
        Ok(listing.filter_map(std::result::Result::ok).count())
    }

    /// A zombie keeps its `/proc` entry but no longer owns an FD table.
    fn is_defunct(&self, pid: u32) -> bool {
        match self.read_pid_file(pid, "stat") {
            Ok(stat) => parse::stat_state(&stat).is_none_or(|s| matches!(s, 'Z' | 'X' | 'x')),
            Err(_) => true,
        }
    }

    fn summarize(&self, pid: u32) -> Result<ProcessSummary> {
        let identity = self.read_identity(pid)?;
        let fd_count = self.fd_count(pid)?;
        Ok(ProcessSummary { identity, fd_count })
    }
}

impl ProcessTable for ProcFs {
    fn list_processes(&self) -> Result<Vec<ProcessSummary>> {
        let mut processes = Vec::new();

        for item in fs::read_dir(&self.root)? {
            let Ok(item) = item else { continue };
            let Some(pid) = item.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };

            // Processes exit or deny access between enumeration and inspection
            match self.summarize(pid) {
                Ok(summary) => processes.push(summary),
                Err(e) => tracing::debug!(pid, error = %e, "skipping process"),
            }
        }

        processes.sort_by(|a, b| {
            b.fd_count
                .cmp(&a.fd_count)
                .then(a.identity.pid.cmp(&b.identity.pid))
        });

        tracing::debug!(count = processes.len(), "process table enumerated");
        Ok(processes)
    }

    fn read_fd_snapshot(&self, pid: u32) -> Result<FdSnapshot> {
        let fd_dir = self.pid_dir(pid).join("fd");
        let listing = fs::read_dir(&fd_dir).map_err(|e| FdscopeError::from_proc_io(pid, e))?;

        let mut entries = Vec::new();
        for item in listing {
            let Ok(item) = item else { continue };
            let Some(fd) = item.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };

            let target = match fs::read_link(item.path()) {
                Ok(target) => target.to_string_lossy().into_owned(),
                Err(e) => {
                    tracing::debug!(pid, fd, error = %e, "unresolvable fd link");
                    UNREADABLE_TARGET.to_owned()
                }
            };
            entries.push(FdEntry::new(fd, target));
        }

        if entries.is_empty() && self.is_defunct(pid) {
            return Err(FdscopeError::ProcessNotFound(pid));
        }

        Ok(FdSnapshot::new(entries))
    }

    fn read_limits(&self, pid: u32) -> Result<ResourceLimits> {
        let limits = self.read_pid_file(pid, "limits")?;
        Ok(parse::open_files_limits(&limits))
    }

    fn read_identity(&self, pid: u32) -> Result<ProcessIdentity> {
        let name = self.read_pid_file(pid, "comm")?.trim_end().to_owned();
        let status = self.read_pid_file(pid, "status")?;

        let user = match parse::status_uid(&status) {
            Some(uid) => match User::from_uid(Uid::from_raw(uid)) {
                Ok(Some(user)) => user.name,
                _ => uid.to_string(),
            },
            None => String::from("?"),
        };

        Ok(ProcessIdentity { pid, name, user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FdKind;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    const LIMITS: &str = "\
Limit                     Soft Limit           Hard Limit           Units
Max cpu time              unlimited            unlimited            seconds
Max open files            1024                 524288               files
Max locked memory         8388608              8388608              bytes
";

    struct FakeProc {
        dir: TempDir,
    }

    impl FakeProc {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        fn table(&self) -> ProcFs {
            ProcFs::with_root(self.dir.path())
        }

        fn add(&self, pid: u32, comm: &str, state: char, fds: &[(u32, &str)]) {
            let pid_dir = self.dir.path().join(pid.to_string());
            let fd_dir = pid_dir.join("fd");
            fs::create_dir_all(&fd_dir).unwrap();
            fs::write(pid_dir.join("comm"), format!("{comm}\n")).unwrap();
            fs::write(
                pid_dir.join("status"),
                format!("Name:\t{comm}\nState:\t{state}\nUid:\t4242421\t4242421\t4242421\t4242421\n"),
            )
            .unwrap();
            fs::write(pid_dir.join("stat"), format!("{pid} ({comm}) {state} 1 {pid} {pid}\n")).unwrap();
            fs::write(pid_dir.join("limits"), LIMITS).unwrap();
            for (fd, target) in fds {
                symlink(target, fd_dir.join(fd.to_string())).unwrap();
            }
        }

        fn fd_dir(&self, pid: u32) -> PathBuf {
            self.dir.path().join(pid.to_string()).join("fd")
        }
    }

    #[test]
    fn snapshot_resolves_and_classifies_links() {
        let fake = FakeProc::new();
        fake.add(
            10,
            "server",
            'S',
            &[(0, "/dev/null"), (1, "socket:[5]"), (2, "/dev/pts/1"), (3, "socket:[88]"), (4, "pipe:[90]"), (7, "/var/db")],
        );

        let snap = fake.table().read_fd_snapshot(10).unwrap();
        let kinds: Vec<(u32, FdKind)> = snap.entries.iter().map(|e| (e.fd, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (0, FdKind::Standard),
                (1, FdKind::Standard),
                (2, FdKind::Standard),
                (3, FdKind::Socket),
                (4, FdKind::Pipe),
                (7, FdKind::File),
            ]
        );
        assert_eq!(snap.entries[3].target, "socket:[88]");
    }

    #[test]
    fn missing_pid_is_not_found() {
        let fake = FakeProc::new();
        let table = fake.table();
        assert!(matches!(table.read_fd_snapshot(999), Err(FdscopeError::ProcessNotFound(999))));
        assert!(matches!(table.read_limits(999), Err(FdscopeError::ProcessNotFound(999))));
        assert!(matches!(table.read_identity(999), Err(FdscopeError::ProcessNotFound(999))));
    }

    #[test]
    fn zombie_without_fds_is_not_found() {
        let fake = FakeProc::new();
        fake.add(20, "gone", 'Z', &[]);
        fake.add(21, "idle", 'S', &[]);

        let table = fake.table();
        assert!(matches!(table.read_fd_snapshot(20), Err(FdscopeError::ProcessNotFound(20))));
        assert!(table.read_fd_snapshot(21).unwrap().is_empty());
    }

    #[test]
    fn limits_and_identity() {
        let fake = FakeProc::new();
        fake.add(30, "worker", 'R', &[(0, "/dev/null")]);

        let table = fake.table();
        assert_eq!(
            table.read_limits(30).unwrap(),
            ResourceLimits {
                soft: Some(1024),
                hard: Some(524_288)
            }
        );

        let identity = table.read_identity(30).unwrap();
        assert_eq!(identity.name, "worker");
        assert_eq!(identity.pid, 30);
        assert!(!identity.user.is_empty());
    }

    #[test]
    fn listing_sorts_by_fd_count_and_skips_junk() {
        let fake = FakeProc::new();
        fake.add(1, "init", 'S', &[(0, "/dev/null")]);
        fake.add(2, "busy", 'S', &[(0, "/dev/null"), (3, "/a"), (4, "/b")]);
        fake.add(3, "tie", 'S', &[(0, "/dev/null")]);
        fs::create_dir_all(fake.dir.path().join("self")).unwrap();
        fs::create_dir_all(fake.dir.path().join("77")).unwrap();

        let listing = fake.table().list_processes().unwrap();
        let order: Vec<(u32, usize)> = listing.iter().map(|p| (p.identity.pid, p.fd_count)).collect();
        assert_eq!(order, vec![(2, 3), (1, 1), (3, 1)]);
    }

    #[test]
    fn unreadable_links_keep_a_placeholder() {
        let fake = FakeProc::new();
        fake.add(40, "odd", 'S', &[(1, "/dev/null")]);
        // Regular files in fd/ make readlink fail with EINVAL
        fs::write(fake.fd_dir(40).join("0"), "").unwrap();
        fs::write(fake.fd_dir(40).join("7"), "").unwrap();

        let snap = fake.table().read_fd_snapshot(40).unwrap();
        let entries: Vec<(u32, &str, FdKind)> = snap
            .entries
            .iter()
            .map(|e| (e.fd, e.target.as_str(), e.kind))
            .collect();
        assert_eq!(
            entries,
            vec![
                (0, UNREADABLE_TARGET, FdKind::Standard),
                (1, "/dev/null", FdKind::Standard),
                (7, UNREADABLE_TARGET, FdKind::Other),
            ]
        );
    }

    #[test]
    fn unlistable_fd_table_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        // Root bypasses directory permissions
        if Uid::effective().is_root() {
            return;
        }

        let fake = FakeProc::new();
        fake.add(50, "private", 'S', &[(0, "/dev/null")]);
        let fd_dir = fake.fd_dir(50);
        fs::set_permissions(&fd_dir, fs::Permissions::from_mode(0o000)).unwrap();

        let result = fake.table().read_fd_snapshot(50);
        fs::set_permissions(&fd_dir, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(FdscopeError::PermissionDenied(50))));
    }
}
