//! fdscope CLI - File-descriptor forensics and FD-constrained sandboxed runs

use clap::{Parser, Subcommand};
use fdscope_core::config::{DEFAULT_FD_LIMIT, default_socket_path, timeout_from_secs};
use fdscope_core::protocol::{Request, Response};
use fdscope_core::{ExecutionConfig, ProcessInspector, SandboxExecutor};
use serde::Serialize;
use std::path::{Path, PathBuf};

mod client;
mod render;

#[derive(Parser)]
#[command(name = "fdscope")]
#[command(author, version, about = "File-descriptor forensics for Linux processes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List processes by open descriptor count
    Ps {
        /// Show only the first N processes
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Analyze the descriptor table of one process
    Inspect {
        pid: u32,

        #[arg(long)]
        json: bool,
    },

    /// Run a .py or .c file locally under the sandbox (without daemon)
    Run {
        file: PathBuf,

        /// Timeout in seconds
        #[arg(short, long, default_value = "30")]
        timeout: f64,

        /// Maximum open descriptors for the program
        #[arg(short, long, default_value_t = DEFAULT_FD_LIMIT)]
        fd_limit: u64,

        /// Python interpreter for .py files
        #[arg(long, default_value = "python3")]
        python: PathBuf,

        /// C compiler for .c files
        #[arg(long, default_value = "gcc")]
        cc: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Run a .py or .c file via the daemon
    Exec {
        file: PathBuf,

        /// Socket path (defaults to FDSCOPE_SOCKET env var or /run/fdscope/fdscope.sock)
        #[arg(short, long)]
        socket: Option<PathBuf>,

        /// Timeout in seconds (daemon default when omitted)
        #[arg(short, long)]
        timeout: Option<f64>,

        /// Maximum open descriptors (daemon default when omitted)
        #[arg(short, long)]
        fd_limit: Option<u64>,

        #[arg(long)]
        json: bool,
    },

    /// Get daemon status
    Status {
        /// Socket path (defaults to FDSCOPE_SOCKET env var or /run/fdscope/fdscope.sock)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Ping the daemon
    Ping {
        /// Socket path (defaults to FDSCOPE_SOCKET env var or /run/fdscope/fdscope.sock)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fdscope=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ps { limit, json } => {
            let mut processes = ProcessInspector::procfs().list_processes()?;
            if let Some(limit) = limit {
                processes.truncate(limit);
            }
            if json {
                print_json(&processes)?;
            } else {
                print!("{}", render::process_table(&processes));
            }
        }

        Commands::Inspect { pid, json } => {
            let analysis = ProcessInspector::procfs().analyze(pid)?;
            if json {
                print_json(&analysis)?;
            } else {
                print!("{}", render::process_analysis(&analysis));
            }
        }

        Commands::Run {
            file,
            timeout,
            fd_limit,
            python,
            cc,
            json,
        } => {
            let config = ExecutionConfig::builder()
                .timeout(timeout_from_secs(timeout)?)
                .fd_limit(fd_limit)
                .python_path(python)
                .cc_path(cc)
                .build()?;
            let (filename, content) = read_upload(&file)?;
            let report = SandboxExecutor::new().execute_upload(&filename, content, &config)?;
            if json {
                print_json(&report)?;
            } else {
                print!("{}", render::execution_report(&report));
            }
        }

        Commands::Exec {
            file,
            socket,
            timeout,
            fd_limit,
            json,
        } => {
            let socket = socket.unwrap_or_else(default_socket_path);
            let (filename, content) = read_upload(&file)?;
            let request = Request::Execute {
                filename,
                content,
                timeout_secs: timeout,
                fd_limit,
            };
            match expect_ok(client::call(&socket, &request)?)? {
                Response::Execution { report, summary } => {
                    if json {
                        print_json(&serde_json::json!({ "report": report, "summary": summary }))?;
                    } else {
                        print!("{}", render::execution_report(&report));
                        println!("--- summary ---\n{summary}");
                    }
                }
                other => return Err(unexpected(&other)),
            }
        }

        Commands::Status { socket } => {
            let socket = socket.unwrap_or_else(default_socket_path);
            match expect_ok(client::call(&socket, &Request::Status)?)? {
                Response::Status {
                    active_runs,
                    max_concurrent_runs,
                    completed_runs,
                } => {
                    println!("Active runs:    {active_runs}/{max_concurrent_runs}");
                    println!("Completed runs: {completed_runs}");
                }
                other => return Err(unexpected(&other)),
            }
        }

        Commands::Ping { socket } => {
            let socket = socket.unwrap_or_else(default_socket_path);
            match expect_ok(client::call(&socket, &Request::Ping)?)? {
                Response::Pong => println!("pong from {}", socket.display()),
                other => return Err(unexpected(&other)),
            }
        }
    }

    Ok(())
}

/// File name and raw bytes of an upload; validation happens in the executor
fn read_upload(path: &Path) -> Result<(String, Vec<u8>), Box<dyn std::error::Error>> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("{} has no usable file name", path.display()))?
        .to_owned();
    let content = std::fs::read(path)?;
    Ok((filename, content))
}

fn expect_ok(response: Response) -> Result<Response, Box<dyn std::error::Error>> {
    match response {
        Response::Error { kind, message } => Err(format!("daemon error ({kind:?}): {message}").into()),
        other => Ok(other),
    }
}

fn unexpected(response: &Response) -> Box<dyn std::error::Error> {
    format!("unexpected response from daemon: {response:?}").into()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
