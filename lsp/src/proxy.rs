//! Stdio proxy between an editor and a noisy language server.
//!
//! Three flows run at once: editor frames go to the server's stdin, the
//! server's stdout goes through the sanitizer to the editor, and the server's
//! stderr goes to the [`ServerLog`]. The session ends when either side closes
//! its stream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::FrameReader;
use crate::noise::ServerLog;
use crate::protocol;
use crate::sanitize::pump;
use crate::server::{ServerProcess, ServerSender, forward_stderr};
use crate::types::{ServerConfig, SessionSummary};

/// How long the relay may keep draining server output after the editor left.
const DRAIN_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Default)]
struct ClientTraffic {
    frames: AtomicU64,
    sent_exit: AtomicBool,
}

impl ClientTraffic {
    fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn sent_exit(&self) -> bool {
        self.sent_exit.load(Ordering::Relaxed)
    }
}

/// A spawned server waiting to be connected to an editor.
pub struct Proxy {
    server: ServerProcess,
    log: ServerLog,
    initialization_options: Option<serde_json::Value>,
}

impl Proxy {
    #[must_use]
    pub fn new(server: ServerProcess, log: ServerLog) -> Self {
        Self {
            server,
            log,
            initialization_options: None,
        }
    }

    /// Options to add to the editor's `initialize` request.
    #[must_use]
    pub fn with_initialization_options(mut self, options: Option<serde_json::Value>) -> Self {
        self.initialization_options = options;
        self
    }

    /// Run the session to completion and stop the server.
    ///
    /// Fails only when relaying server output fails; editor-side errors end
    /// the session normally.
    pub async fn run<I, O>(self, client_in: I, client_out: O) -> Result<SessionSummary>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let Self {
            mut server,
            log,
            initialization_options,
        } = self;

        let stdout = server
            .take_stdout()
            .context("server stdout already taken")?;
        if let Some(stderr) = server.take_stderr() {
            tokio::spawn(forward_stderr(stderr, log.clone()));
        }

        let sender = server.sender();
        let traffic = ClientTraffic::default();
        let mut noise = log;
        let mut exit_sent_here = false;

        let relayed = {
            let relay = pump(stdout, client_out, &mut noise);
            let client = forward_client(
                client_in,
                &sender,
                initialization_options.as_ref(),
                &traffic,
            );
            tokio::pin!(relay, client);

            tokio::select! {
                relayed = &mut relay => {
                    tracing::info!("Server closed its output");
                    Some(relayed)
                }
                result = &mut client => {
                    if let Err(e) = result {
                        tracing::warn!("Editor stream failed: {e:#}");
                    }
                    tracing::info!("Editor closed the session");

                    let drain = Duration::from_secs(DRAIN_TIMEOUT_SECS);
                    exit_sent_here = sender.finish(!traffic.sent_exit(), drain).await;

                    if let Ok(relayed) = tokio::time::timeout(drain, &mut relay).await {
                        Some(relayed)
                    } else {
                        tracing::debug!("Server output still open after {drain:?}");
                        None
                    }
                }
            }
        };

        let exit_status = server
            .shutdown(traffic.sent_exit() || exit_sent_here)
            .await;

        let relayed = relayed
            .transpose()
            .context("relaying server output")?;
        if let Some(stats) = &relayed {
            tracing::info!(
                messages = stats.messages,
                message_bytes = stats.message_bytes,
                noise_bytes = stats.noise_bytes,
                "Relay finished"
            );
        }

        Ok(SessionSummary {
            relayed,
            frames_to_server: traffic.frames(),
            client_sent_exit: traffic.sent_exit(),
            exit_status,
        })
    }
}

/// Spawn the server described by `config` and proxy it over the given streams.
pub async fn run_proxy<I, O>(
    config: &ServerConfig,
    initialization_options: Option<serde_json::Value>,
    log: ServerLog,
    client_in: I,
    client_out: O,
) -> Result<SessionSummary>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let server = ServerProcess::spawn(config)?;
    Proxy::new(server, log)
        .with_initialization_options(initialization_options)
        .run(client_in, client_out)
        .await
}

/// Forward editor frames to the server until EOF or the editor's `exit`.
async fn forward_client<R>(
    client_in: R,
    sender: &ServerSender,
    initialization_options: Option<&serde_json::Value>,
    traffic: &ClientTraffic,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = FrameReader::new(client_in);
    while let Some(body) = reader.read_frame().await? {
        let method = protocol::method_of(&body);

        let injected = initialization_options
            .and_then(|options| protocol::with_initialization_options(&body, options));
        if injected.is_some() {
            tracing::debug!("Added initializationOptions to initialize");
        }
        sender.send(injected.unwrap_or(body)).await?;
        traffic.frames.fetch_add(1, Ordering::Relaxed);

        if method.as_deref() == Some("exit") {
            traffic.sent_exit.store(true, Ordering::Relaxed);
            break;
        }
    }
    Ok(())
}
