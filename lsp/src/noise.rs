//! Where discarded server output goes.
//!
//! Noise never reaches the editor. It is logged through `tracing` and, when a
//! debug file is configured, appended there verbatim between `> STDOUT` and
//! `< STDOUT` marker lines. Server stderr shares the same file unmarked, so the
//! operator sees both streams interleaved in arrival order.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use sieve_types::noise_text;

/// Receives bytes the sanitizer discarded. Must not block for long: it runs
/// inline with the relay.
pub trait NoiseSink: Send {
    fn discarded(&mut self, bytes: &[u8]);
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardNoise;

impl NoiseSink for DiscardNoise {
    fn discarded(&mut self, _bytes: &[u8]) {}
}

impl<T: NoiseSink + ?Sized> NoiseSink for &mut T {
    fn discarded(&mut self, bytes: &[u8]) {
        (**self).discarded(bytes);
    }
}

impl NoiseSink for Vec<u8> {
    fn discarded(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Debug channel for server output that is not protocol traffic.
///
/// Cheap to clone; clones share the same file.
#[derive(Debug, Clone, Default)]
pub struct ServerLog {
    file: Option<Arc<Mutex<File>>>,
}

impl ServerLog {
    /// Log through `tracing` only.
    #[must_use]
    pub fn tracing_only() -> Self {
        Self::default()
    }

    /// Also append to `path`, creating it and its parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
        })
    }

    /// Record stdout bytes that were not part of any message.
    pub fn noise(&self, bytes: &[u8]) {
        tracing::info!(target: "sieve::noise", bytes = bytes.len(), "{}", noise_text(bytes));
        self.append(&[b"> STDOUT\n", bytes, b"< STDOUT\n"]);
    }

    /// Record one chunk of server stderr.
    pub fn stderr(&self, bytes: &[u8]) {
        let text = noise_text(bytes);
        tracing::info!(target: "sieve::stderr", "{}", text.trim_end());
        self.append(&[bytes]);
    }

    fn append(&self, parts: &[&[u8]]) {
        let Some(file) = &self.file else { return };
        let Ok(mut file) = file.lock() else { return };
        let result = parts
            .iter()
            .try_for_each(|part| file.write_all(part))
            .and_then(|()| file.flush());
        if let Err(e) = result {
            tracing::warn!("Failed to write server log: {e}");
        }
    }
}

impl NoiseSink for ServerLog {
    fn discarded(&mut self, bytes: &[u8]) {
        self.noise(bytes);
    }
}
