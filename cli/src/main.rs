//! sieve - runs a language server that writes noise to stdout behind a clean
//! LSP stdio channel.
//!
//! The editor launches `sieve` instead of the server:
//!
//! ```text
//! editor stdin  ──▶ sieve ──▶ server stdin
//! editor stdout ◀── sanitizer ◀── server stdout (messages + noise)
//!                   noise log ◀── server stderr
//! ```
//!
//! stdout belongs to the protocol. Logging goes to a file or stderr only.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use sieve_config::{ServerOverrides, SieveConfig};
use sieve_lsp::{ServerLog, SessionSummary, run_proxy};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(name = "sieve", version)]
#[command(about = "Strip non-LSP output from a language server's stdout", long_about = None)]
struct Cli {
    /// Config file [default: ~/.sieve/config.toml]
    #[arg(long, env = "SIEVE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Language server executable, overrides [server] path
    #[arg(long, value_name = "COMMAND")]
    server: Option<String>,

    /// Working directory for the server
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Write sieve's own log here instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Append server stderr and discarded stdout here
    #[arg(long, value_name = "FILE")]
    noise_file: Option<PathBuf>,

    /// Arguments passed to the server, after `--`
    #[arg(last = true, value_name = "SERVER_ARGS")]
    server_args: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> ServerOverrides {
        ServerOverrides {
            path: self.server.clone(),
            args: self.server_args.clone(),
            cwd: self.cwd.clone(),
        }
    }
}

fn init_tracing(filter: Option<&str>, log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let mut warning = None;
    if let Some(path) = log_file {
        match open_log_file(path) {
            Ok(file) => {
                tracing_subscriber::registry()
                    .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                    .with(env_filter)
                    .init();
                tracing::info!(path = %path.display(), "Logging initialized");
                return;
            }
            Err(e) => warning = Some(format!("{e:#}; logging to stderr")),
        }
    }

    // Never stdout: that is the editor's protocol channel.
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
    if let Some(warning) = warning {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log dir {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn server_log(noise_file: Option<&Path>) -> ServerLog {
    let Some(path) = noise_file else {
        return ServerLog::tracing_only();
    };
    match ServerLog::open(path) {
        Ok(log) => log,
        Err(e) => {
            tracing::warn!("{e:#}; server output is logged through tracing only");
            ServerLog::tracing_only()
        }
    }
}

fn report(summary: &SessionSummary) {
    match &summary.relayed {
        Some(stats) => tracing::info!(
            messages = stats.messages,
            noise_bytes = stats.noise_bytes,
            frames_to_server = summary.frames_to_server,
            "Session ended"
        ),
        None => tracing::info!(
            frames_to_server = summary.frames_to_server,
            "Session ended before the server closed its output"
        ),
    }
    if let Some(status) = summary.exit_status
        && !status.success()
    {
        tracing::warn!("Language server exited with {status}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SieveConfig::load(cli.config.as_deref())?;

    let log_file = cli.log_file.as_deref().or(config.log_file());
    init_tracing(config.log_filter(), log_file);

    let server = config.server_config(&cli.overrides())?;
    let options = config.initialization_options().to_json();
    let log = server_log(cli.noise_file.as_deref().or(config.noise_file()));

    let summary = run_proxy(&server, options, log, tokio::io::stdin(), tokio::io::stdout())
        .await
        .with_context(|| format!("running {}", server.command()))?;
    report(&summary);

    Ok(())
}
