//! Async plumbing for sieve: runs a noisy language server behind a clean
//! stdio LSP channel.
//!
//! [`pump`] and [`messages`] drive the sanitizer from `sieve-types` over a tokio
//! reader. [`ServerProcess`] owns the child and [`Proxy`] connects it to an
//! editor.

pub mod codec;
pub mod types;

pub(crate) mod protocol;

mod noise;
mod proxy;
mod sanitize;
mod server;

pub use noise::{DiscardNoise, NoiseSink, ServerLog};
pub use proxy::{Proxy, run_proxy};
pub use sanitize::{READ_CHUNK_BYTES, messages, pump};
pub use server::{ServerProcess, ServerSender, SpawnError, forward_stderr};
pub use types::{InitializationOptions, PumpStats, ServerConfig, SessionSummary};
