//! Server process: owns the child and its stdin writer.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codec::FrameWriter;
use crate::noise::ServerLog;
use crate::protocol;
use crate::types::ServerConfig;

const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

const WRITER_CHANNEL_CAPACITY: usize = 64;

/// The server could not be started. No sanitizer is ever created for it.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("{command} not found in PATH")]
    NotFound {
        command: String,
        #[source]
        source: which::Error,
    },
    #[error("failed to spawn {command}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("no {0} pipe from child")]
    MissingPipe(&'static str),
}

enum WriterCommand {
    Send(Vec<u8>),
    Shutdown,
}

/// Frames bodies onto the server's stdin from any task.
#[derive(Clone)]
pub struct ServerSender {
    tx: mpsc::Sender<WriterCommand>,
}

impl ServerSender {
    /// Queue one message body.
    pub async fn send(&self, body: Vec<u8>) -> Result<()> {
        self.tx
            .send(WriterCommand::Send(body))
            .await
            .map_err(|_| anyhow!("server stdin closed"))
    }

    /// Queue the `exit` notification.
    pub async fn send_exit(&self) -> Result<()> {
        self.send(protocol::exit_notification()?).await
    }

    /// Close the server's stdin once everything queued so far is written.
    pub async fn close(&self) {
        let _ = self.tx.send(WriterCommand::Shutdown).await;
    }

    /// Queue `exit` if asked, then close stdin. Gives up after `grace` when the
    /// server has stopped reading and the queue is full. Returns whether `exit`
    /// was queued.
    pub async fn finish(&self, send_exit: bool, grace: Duration) -> bool {
        let mut exit_queued = false;
        let queue = async {
            if send_exit {
                match self.send_exit().await {
                    Ok(()) => exit_queued = true,
                    Err(e) => tracing::debug!("Could not send exit: {e:#}"),
                }
            }
            self.close().await;
        };
        if tokio::time::timeout(grace, queue).await.is_err() {
            tracing::debug!("Server stdin still blocked after {grace:?}");
        }
        exit_queued
    }
}

pub(crate) fn spawn_writer<W>(stdin: W) -> (ServerSender, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut writer = FrameWriter::new(stdin);
        while let Some(cmd) = rx.recv().await {
            match cmd {
                WriterCommand::Send(body) => {
                    if let Err(e) = writer.write_body(&body).await {
                        tracing::warn!("Server write error: {e:#}");
                        break;
                    }
                }
                WriterCommand::Shutdown => break,
            }
        }
    });
    (ServerSender { tx }, handle)
}

/// A running language server.
///
/// The child is killed if this is dropped without [`shutdown`](Self::shutdown).
pub struct ServerProcess {
    command: String,
    child: Child,
    sender: ServerSender,
    writer_handle: JoinHandle<()>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl ServerProcess {
    /// Start the server with piped stdio. Must be called inside a tokio runtime.
    pub fn spawn(config: &ServerConfig) -> Result<Self, SpawnError> {
        let command = config.command().to_string();
        let resolved = which::which(config.command()).map_err(|source| SpawnError::NotFound {
            command: command.clone(),
            source,
        })?;

        let mut cmd = Command::new(&resolved);
        cmd.args(config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = config.cwd() {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|source| SpawnError::Spawn {
            command: command.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SpawnError::MissingPipe("stderr"))?;

        tracing::info!(
            pid = child.id(),
            "Started {} {:?}",
            resolved.display(),
            config.args()
        );

        let (sender, writer_handle) = spawn_writer(stdin);
        Ok(Self {
            command,
            child,
            sender,
            writer_handle,
            stdout: Some(stdout),
            stderr: Some(stderr),
        })
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The raw, possibly noisy, stdout. `None` after the first call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// `None` after the first call.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    #[must_use]
    pub fn sender(&self) -> ServerSender {
        self.sender.clone()
    }

    /// Stop the server. Consumes self.
    ///
    /// Sends `exit` unless `exit_sent`, closes stdin, and waits for the process
    /// for a grace period before killing it.
    pub async fn shutdown(self, exit_sent: bool) -> Option<ExitStatus> {
        let Self {
            command,
            mut child,
            sender,
            mut writer_handle,
            ..
        } = self;

        let grace = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        sender.finish(!exit_sent, grace).await;
        drop(sender);

        // Aborting drops the writer and with it the child's stdin.
        if tokio::time::timeout(grace, &mut writer_handle).await.is_err() {
            tracing::debug!("Writer for '{command}' still blocked after {grace:?}, aborting");
            writer_handle.abort();
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!("'{command}' exited with {status}");
                Some(status)
            }
            Ok(Err(e)) => {
                tracing::warn!("Waiting for '{command}' failed: {e}");
                None
            }
            Err(_) => {
                tracing::debug!("'{command}' didn't exit in time, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!("Killing '{command}' failed: {e}");
                }
                child.wait().await.ok()
            }
        }
    }
}

/// Copy server stderr into `log` line by line until EOF.
pub async fn forward_stderr<R>(stderr: R, log: ServerLog)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => log.stderr(&line),
            Err(e) => {
                tracing::debug!("Server stderr read error: {e}");
                break;
            }
        }
    }
}
