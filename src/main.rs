//! session-reap-worker - Out-of-Process Session Reaper
//!
//! Runs a single reap pass over a session directory and exits. The store's
//! scheduler launches this binary when asynchronous reaping is enabled.
//!
//! ```text
//! SESSION_REAP_SECRET=... session-reap-worker <path> <ttl>
//! ```

use session_file_store::worker::{self, WorkerArgs};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn print_help() {
    println!(
        r#"
session-reap-worker - Delete expired session files

USAGE:
    session-reap-worker <PATH> [TTL]

ARGS:
    <PATH>    Directory holding the session files
    [TTL]     Session time-to-live in seconds (default: 3600)

OPTIONS:
    -v, --version        Print version information
        --help           Print this help message

ENVIRONMENT:
    SESSION_REAP_FILE_EXTENSION    Session file suffix (default: .json)
    SESSION_REAP_SECRET            Secret of an encrypted store
    SESSION_REAP_KEY_DERIVATION    sha256 | sha512 (default: sha512)
    SESSION_REAP_MAX_CONCURRENT    Concurrent deletions (default: 10)

EXIT STATUS:
    0    The reap pass completed (individual file errors are logged)
    1    No session directory was given
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("--help") => {
            print_help();
            return Ok(ExitCode::SUCCESS);
        }
        Some("--version") | Some("-v") => {
            println!("session-reap-worker version {}", session_file_store::VERSION);
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {}", e))?;

    let worker_args = WorkerArgs::parse(&args).with_env(|key| std::env::var(key).ok());
    let code = worker::run(worker_args).await;
    Ok(ExitCode::from(code as u8))
}
