//! fdscope-daemon - Process inspection and sandboxed runs over a Unix socket
//!
//! Each connection carries length-prefixed msgpack requests. Inspection and
//! sandbox work run on the blocking pool; concurrent sandboxed runs are
//! bounded by `FDSCOPE_MAX_RUNS`.

use anyhow::Result;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::EnvFilter;

mod config;
mod server;

use config::DaemonConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fdscope=info".parse()?))
        .init();

    tracing::info!("fdscope-daemon starting");

    let config = DaemonConfig::from_env()?;
    tracing::info!(
        max_concurrent_runs = config.max_concurrent_runs,
        timeout_secs = config.execution.timeout.as_secs_f64(),
        fd_limit = config.execution.fd_limit,
        summarizer = ?config.summarizer_command,
        socket = ?config.socket_path,
        "configuration loaded"
    );

    // Create socket directory if needed
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Remove a stale socket from a previous run
    let _ = std::fs::remove_file(&config.socket_path);

    let listener = UnixListener::bind(&config.socket_path)?;
    tracing::info!(socket = ?config.socket_path, "listening");

    let socket_path = config.socket_path.clone();
    let daemon = Arc::new(server::Daemon::new(config));

    let mut terminate = signal(SignalKind::terminate())?;
    let outcome = tokio::select! {
        result = server::run(listener, daemon) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
        _ = terminate.recv() => Ok(()),
    };

    tracing::info!("fdscope-daemon shutting down");
    let _ = std::fs::remove_file(&socket_path);
    outcome
}
