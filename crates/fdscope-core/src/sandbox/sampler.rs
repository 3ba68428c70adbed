//! Concurrent FD sampling of a running child
//!
//! The sampler owns its sample log and hands it back when joined. The only
//! channel into it is a stop signal, checked between reads, so a read that is
//! already in flight always completes.

use crate::procfs::ProcessTable;
use crate::report::FdGrowthSample;
use crate::result::round_millis;
use crate::types::FdSnapshot;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Fixed period between two reads of the child's FD table
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// What a sampler observed
#[derive(Debug, Default)]
pub struct SampleLog {
    /// Counts in increasing time, the first at 0
    pub samples: Vec<FdGrowthSample>,
    /// Most recent successful read
    pub last_snapshot: Option<FdSnapshot>,
}

#[derive(Debug)]
pub struct FdSampler {
    stop_tx: Sender<()>,
    handle: JoinHandle<SampleLog>,
}

impl FdSampler {
    /// Start sampling `pid` every `interval`
    pub fn start<T>(table: T, pid: u32, interval: Duration) -> Self
    where
        T: ProcessTable + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || sample_loop(&table, pid, interval, &stop_rx));
        tracing::debug!(pid, interval_ms = interval.as_millis(), "fd sampler started");
        Self { stop_tx, handle }
    }

    /// Signal the sampler to stop without waiting for it
    pub fn request_stop(&self) {
        // The sampler may already have ended on its own
        let _ = self.stop_tx.send(());
    }

    /// Stop and collect the log
    pub fn stop(self) -> SampleLog {
        self.request_stop();
        self.handle.join().unwrap_or_else(|_| {
            tracing::error!("fd sampler panicked, discarding samples");
            SampleLog::default()
        })
    }
}

fn sample_loop<T: ProcessTable>(
    table: &T,
    pid: u32,
    interval: Duration,
    stop_rx: &Receiver<()>,
) -> SampleLog {
    let mut log = SampleLog::default();
    let mut origin: Option<Instant> = None;

    loop {
        if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }

        match table.read_fd_snapshot(pid) {
            Ok(snapshot) => {
                let time_sec = match origin {
                    Some(start) => round_millis(start.elapsed().as_secs_f64()),
                    None => {
                        origin = Some(Instant::now());
                        0.0
                    }
                };
                log.samples.push(FdGrowthSample {
                    time_sec,
                    fd_count: snapshot.len(),
                });
                log.last_snapshot = Some(snapshot);
            }
            Err(e) => {
                // Expected once the child has exited
                tracing::debug!(pid, error = %e, "fd sampling ended");
                break;
            }
        }

        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!(pid, samples = log.samples.len(), "fd sampler stopped");
    log
}
