//! Unix socket server

use crate::config::DaemonConfig;
use anyhow::{Context, Result};
use fdscope_core::config::timeout_from_secs;
use fdscope_core::error::ErrorKind;
use fdscope_core::frame::{self, HEADER_LEN};
use fdscope_core::protocol::{self, Request, Response};
use fdscope_core::summary::{CommandSummarizer, summarize_or_fallback};
use fdscope_core::{ExecutionConfig, FdscopeError, ProcessInspector, SandboxExecutor};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;

/// State shared by every connection
#[derive(Debug)]
pub struct Daemon {
    config: DaemonConfig,
    inspector: ProcessInspector,
    executor: SandboxExecutor,
    summarizer: Option<CommandSummarizer>,
    runs: Arc<Semaphore>,
    completed_runs: AtomicU64,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        let summarizer = config.summarizer_command.clone().map(CommandSummarizer::new);
        let runs = Arc::new(Semaphore::new(config.max_concurrent_runs));
        Self {
            config,
            inspector: ProcessInspector::procfs(),
            executor: SandboxExecutor::new(),
            summarizer,
            runs,
            completed_runs: AtomicU64::new(0),
        }
    }

    /// Handle a single request
    pub async fn handle(self: &Arc<Self>, request: Request) -> Response {
        match request {
            Request::ListProcesses => {
                let daemon = Arc::clone(self);
                blocking(move || {
                    daemon
                        .inspector
                        .list_processes()
                        .map(|processes| Response::Processes { processes })
                })
                .await
            }

            Request::Analyze { pid } => {
                let daemon = Arc::clone(self);
                blocking(move || {
                    daemon
                        .inspector
                        .analyze(pid)
                        .map(|analysis| Response::Analysis { analysis })
                })
                .await
            }

            Request::Execute {
                filename,
                content,
                timeout_secs,
                fd_limit,
            } => {
                let config = match self.run_config(timeout_secs, fd_limit) {
                    Ok(config) => config,
                    Err(e) => return Response::from_error(&e),
                };

                let Ok(permit) = Arc::clone(&self.runs).acquire_owned().await else {
                    return internal("run limiter closed");
                };

                let daemon = Arc::clone(self);
                blocking(move || {
                    let _permit = permit;
                    let report = daemon.executor.execute_upload(&filename, content, &config)?;
                    daemon.completed_runs.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        filename = %filename,
                        reason = %report.execution.termination_reason,
                        "sandboxed run served"
                    );
                    let summary = summarize_or_fallback(daemon.summarizer.as_ref(), &report);
                    Ok(Response::Execution { report, summary })
                })
                .await
            }

            Request::Status => Response::Status {
                active_runs: self.config.max_concurrent_runs - self.runs.available_permits(),
                max_concurrent_runs: self.config.max_concurrent_runs,
                completed_runs: self.completed_runs.load(Ordering::Relaxed),
            },

            Request::Ping => Response::Pong,
        }
    }

    /// Daemon defaults with the request's overrides
    fn run_config(
        &self,
        timeout_secs: Option<f64>,
        fd_limit: Option<u64>,
    ) -> fdscope_core::Result<ExecutionConfig> {
        let mut config = self.config.execution.clone();
        if let Some(secs) = timeout_secs {
            config.timeout = timeout_from_secs(secs)?;
        }
        if let Some(limit) = fd_limit {
            config.fd_limit = limit;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run the daemon server
pub async fn run(listener: UnixListener, daemon: Arc<Daemon>) -> Result<()> {
    loop {
        let (stream, _) = listener.accept().await.context("accepting connection")?;
        let daemon = Arc::clone(&daemon);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, daemon).await {
                tracing::error!(error = %e, "connection error");
            }
        });
    }
}

/// Handle a single client connection
async fn handle_connection(mut stream: UnixStream, daemon: Arc<Daemon>) -> Result<()> {
    loop {
        let mut header = [0u8; HEADER_LEN];
        if stream.read_exact(&mut header).await.is_err() {
            break; // Client disconnected
        }

        let len = match frame::payload_len(header) {
            Ok(len) => len,
            Err(e) => {
                // The stream cannot be resynchronized after a bad header
                write_response(&mut stream, &Response::from_error(&e)).await?;
                break;
            }
        };

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await?;

        let response = match protocol::decode::<Request>(&payload) {
            Ok(request) => {
                tracing::debug!(?request, "received request");
                daemon.handle(request).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "undecodable request");
                Response::from_error(&e)
            }
        };

        write_response(&mut stream, &response).await?;
    }

    Ok(())
}

async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<()> {
    let bytes = protocol::encode(response)?;
    stream.write_all(&frame::header_for(bytes.len())?).await?;
    stream.write_all(&bytes).await?;
    Ok(())
}

/// Run blocking core work off the async executor
async fn blocking<F>(work: F) -> Response
where
    F: FnOnce() -> fdscope_core::Result<Response> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, kind = ?e.kind(), "request failed");
            Response::from_error(&e)
        }
        Err(e) => {
            tracing::error!(error = %e, "request task failed");
            internal(&e.to_string())
        }
    }
}

fn internal(message: &str) -> Response {
    Response::Error {
        kind: ErrorKind::Internal,
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daemon() -> Arc<Daemon> {
        Arc::new(Daemon::new(DaemonConfig::default()))
    }

    #[tokio::test]
    async fn ping_and_status() {
        let daemon = daemon();
        assert_eq!(daemon.handle(Request::Ping).await, Response::Pong);
        assert_eq!(
            daemon.handle(Request::Status).await,
            Response::Status {
                active_runs: 0,
                max_concurrent_runs: 4,
                completed_runs: 0,
            }
        );
    }

    #[tokio::test]
    async fn inspection_errors_keep_their_kind() {
        let response = daemon().handle(Request::Analyze { pid: u32::MAX - 1 }).await;
        assert!(matches!(
            response,
            Response::Error {
                kind: ErrorKind::ProcessNotFound,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn bad_overrides_and_uploads_are_rejected() {
        let daemon = daemon();
        let response = daemon
            .handle(Request::Execute {
                filename: "a.py".into(),
                content: b"print(1)".to_vec(),
                timeout_secs: Some(f64::NAN),
                fd_limit: None,
            })
            .await;
        assert!(matches!(
            response,
            Response::Error {
                kind: ErrorKind::InvalidConfig,
                ..
            }
        ));

        let response = daemon
            .handle(Request::Execute {
                filename: "a.sh".into(),
                content: b"echo 1".to_vec(),
                timeout_secs: None,
                fd_limit: None,
            })
            .await;
        assert!(matches!(
            response,
            Response::Error {
                kind: ErrorKind::InvalidUpload,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn serves_framed_requests_over_a_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fdscope.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(run(listener, daemon()));

        let mut client = UnixStream::connect(&path).await.unwrap();
        for request in [Request::Ping, Request::ListProcesses] {
            let bytes = protocol::encode(&request).unwrap();
            client.write_all(&frame::header_for(bytes.len()).unwrap()).await.unwrap();
            client.write_all(&bytes).await.unwrap();

            let mut header = [0u8; HEADER_LEN];
            client.read_exact(&mut header).await.unwrap();
            let mut payload = vec![0u8; frame::payload_len(header).unwrap()];
            client.read_exact(&mut payload).await.unwrap();

            let response: Response = protocol::decode(&payload).unwrap();
            match request {
                Request::Ping => assert_eq!(response, Response::Pong),
                _ => assert!(matches!(response, Response::Processes { processes } if !processes.is_empty())),
            }
        }

        server.abort();
    }
}
