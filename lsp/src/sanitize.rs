//! Async drivers for [`Sanitizer`].
//!
//! [`pump`] is the proxy's hot path: it relays message bytes to the editor as
//! soon as they arrive, without waiting for a message to finish. [`messages`]
//! is the pull-based view for consumers that want one whole message per item.

use std::collections::VecDeque;
use std::io;

use futures_util::Stream;
use futures_util::stream;
use sieve_types::{Emitted, Leftover, MessageAssembler, Sanitizer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::noise::NoiseSink;
use crate::types::PumpStats;

/// Size of each read from the server's stdout.
pub const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Relay the sanitized contents of `reader` to `writer` until EOF.
///
/// Frame bytes are written as they are produced and `writer` is flushed once
/// per chunk read. Noise goes to `sink`. Read and write errors end the relay;
/// a truncated message or trailing noise at EOF does not.
pub async fn pump<R, W, S>(mut reader: R, mut writer: W, sink: &mut S) -> io::Result<PumpStats>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: NoiseSink + ?Sized,
{
    let mut sanitizer = Sanitizer::new();
    let mut stats = PumpStats::default();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        let mut wrote = false;
        for segment in sanitizer.on_chunk(&buf[..n]) {
            match segment {
                Emitted::Frame { bytes, complete } => {
                    writer.write_all(&bytes).await?;
                    stats.message_bytes += bytes.len() as u64;
                    if complete {
                        stats.messages += 1;
                    }
                    wrote = true;
                }
                Emitted::Noise(bytes) => {
                    stats.noise_bytes += bytes.len() as u64;
                    sink.discarded(&bytes);
                }
            }
        }
        if wrote {
            writer.flush().await?;
        }
    }

    stats.leftover = sanitizer.on_end();
    log_leftover(stats.leftover);
    Ok(stats)
}

fn log_leftover(leftover: Leftover) {
    if leftover.missing_payload > 0 {
        tracing::warn!(
            missing = leftover.missing_payload,
            "Server output ended inside a message"
        );
    }
    if leftover.pending_bytes > 0 {
        tracing::debug!(
            bytes = leftover.pending_bytes,
            "Dropping unterminated trailing output"
        );
    }
}

struct MessageState<R, S> {
    reader: R,
    sink: S,
    /// `None` once the source has ended or failed.
    sanitizer: Option<Sanitizer>,
    assembler: MessageAssembler,
    ready: VecDeque<Vec<u8>>,
    buf: Vec<u8>,
}

/// Lazily read `reader` and yield every complete message, header included.
///
/// The source is only read when the consumer asks for the next message and
/// none is buffered. A message cut off by EOF is never yielded. A read error
/// is yielded once and ends the stream.
pub fn messages<R, S>(reader: R, sink: S) -> impl Stream<Item = io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin,
    S: NoiseSink,
{
    let state = MessageState {
        reader,
        sink,
        sanitizer: Some(Sanitizer::new()),
        assembler: MessageAssembler::new(),
        ready: VecDeque::new(),
        buf: vec![0u8; READ_CHUNK_BYTES],
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(message) = state.ready.pop_front() {
                return Some((Ok(message), state));
            }

            let sanitizer = state.sanitizer.as_mut()?;
            match state.reader.read(&mut state.buf).await {
                Ok(0) => {
                    if let Some(sanitizer) = state.sanitizer.take() {
                        log_leftover(sanitizer.on_end());
                    }
                    return None;
                }
                Ok(n) => {
                    for segment in sanitizer.on_chunk(&state.buf[..n]) {
                        match segment {
                            Emitted::Noise(bytes) => state.sink.discarded(&bytes),
                            frame => {
                                if let Some(message) = state.assembler.push(frame) {
                                    state.ready.push_back(message);
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    state.sanitizer = None;
                    return Some((Err(e), state));
                }
            }
        }
    })
}
