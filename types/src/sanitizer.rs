//! Incremental sanitizer for a noisy LSP output stream.
//!
//! Some language servers print diagnostics straight onto stdout, between
//! protocol messages. [`Sanitizer`] consumes the raw stream one chunk at a
//! time and emits only bytes that belong to `Content-Length` framed messages.
//! Chunk boundaries carry no meaning: headers, payloads and noise may be split
//! anywhere, and one chunk may hold several messages.
//!
//! # States
//!
//! ```text
//!            header found, payload incomplete
//!   Scanning ────────────────────────────────▶ Waiting { remaining }
//!      ▲                                            │
//!      └──────────── remaining payload arrived ─────┘
//! ```
//!
//! While scanning, unclassified bytes accumulate in a pending buffer. While
//! waiting, the pending buffer does not exist: every incoming byte up to
//! `remaining` is payload and is forwarded as it arrives.

use std::mem;
use std::num::NonZeroUsize;

use crate::frame::{dead_prefix_len, locate_header};

/// Bytes produced by one [`Sanitizer::on_chunk`] call, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitted {
    /// Message bytes, forwarded verbatim. `complete` is set on the segment
    /// that finishes its message.
    Frame { bytes: Vec<u8>, complete: bool },
    /// Bytes discarded as noise. Never part of the protocol output.
    Noise(Vec<u8>),
}

impl Emitted {
    /// Message bytes of this segment, `None` for noise.
    #[must_use]
    pub fn frame_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Frame { bytes, .. } => Some(bytes),
            Self::Noise(_) => None,
        }
    }
}

/// What was still buffered when the source stream ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Leftover {
    /// Unclassified bytes that never formed a complete header.
    pub pending_bytes: usize,
    /// Payload bytes owed to a message that was cut off.
    pub missing_payload: usize,
}

impl Leftover {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.pending_bytes == 0 && self.missing_payload == 0
    }
}

#[derive(Debug)]
enum State {
    Scanning { pending: Vec<u8> },
    Waiting { remaining: NonZeroUsize },
}

/// Stateful byte-stream transform from raw server output to LSP messages.
///
/// Drive it with [`on_chunk`](Self::on_chunk) for every chunk read from the
/// source and finish with [`on_end`](Self::on_end). The concatenation of all
/// emitted frame bytes is the concatenation of every message in the source, in
/// order, with everything else removed, however the chunks were cut.
#[derive(Debug)]
pub struct Sanitizer {
    state: State,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Scanning {
                pending: Vec::new(),
            },
        }
    }

    /// Payload bytes still owed to the in-flight message. Zero while scanning.
    #[must_use]
    pub fn waiting_for(&self) -> usize {
        match &self.state {
            State::Scanning { .. } => 0,
            State::Waiting { remaining } => remaining.get(),
        }
    }

    /// Unclassified bytes held while scanning. Zero while waiting.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        match &self.state {
            State::Scanning { pending } => pending.len(),
            State::Waiting { .. } => 0,
        }
    }

    /// Feed one chunk of the source stream.
    ///
    /// The chunk is copied; the caller may reuse its buffer afterwards.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Vec<Emitted> {
        let mut emitted = Vec::new();
        if chunk.is_empty() {
            return emitted;
        }

        let state = mem::replace(
            &mut self.state,
            State::Scanning {
                pending: Vec::new(),
            },
        );

        self.state = match state {
            State::Waiting { remaining } => {
                let owed = remaining.get();
                if let Some(left) = owed.checked_sub(chunk.len()).and_then(NonZeroUsize::new) {
                    emitted.push(Emitted::Frame {
                        bytes: chunk.to_vec(),
                        complete: false,
                    });
                    State::Waiting { remaining: left }
                } else {
                    let (tail_of_message, rest) = chunk.split_at(owed);
                    emitted.push(Emitted::Frame {
                        bytes: tail_of_message.to_vec(),
                        complete: true,
                    });
                    scan(rest.to_vec(), &mut emitted)
                }
            }
            State::Scanning { mut pending } => {
                pending.extend_from_slice(chunk);
                scan(pending, &mut emitted)
            }
        };

        emitted
    }

    /// Finish the stream. Whatever is left is dropped; a truncated trailing
    /// message or trailing noise is not a protocol failure.
    #[must_use]
    pub fn on_end(self) -> Leftover {
        match self.state {
            State::Scanning { pending } => Leftover {
                pending_bytes: pending.len(),
                missing_payload: 0,
            },
            State::Waiting { remaining } => Leftover {
                pending_bytes: 0,
                missing_payload: remaining.get(),
            },
        }
    }
}

/// Extract every message that can be extracted from `pending` and return the
/// state to continue in.
fn scan(mut pending: Vec<u8>, emitted: &mut Vec<Emitted>) -> State {
    loop {
        let Some(header) = locate_header(&pending) else {
            let dead = dead_prefix_len(&pending);
            if dead > 0 {
                emitted.push(Emitted::Noise(pending.drain(..dead).collect()));
            }
            return State::Scanning { pending };
        };

        let begin = header.begin();
        if begin > 0 {
            emitted.push(Emitted::Noise(pending.drain(..begin).collect()));
        }

        let needed = header.frame_len();
        if let Some(remaining) = NonZeroUsize::new(needed.saturating_sub(pending.len())) {
            emitted.push(Emitted::Frame {
                bytes: pending,
                complete: false,
            });
            return State::Waiting { remaining };
        }

        let rest = pending.split_off(needed);
        emitted.push(Emitted::Frame {
            bytes: pending,
            complete: true,
        });
        pending = rest;
    }
}
