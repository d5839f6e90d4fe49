//! Joins sanitizer segments into whole messages.

use crate::sanitizer::Emitted;

/// Collects [`Emitted::Frame`] segments until a message is complete.
///
/// The sanitizer forwards an in-flight message piecewise so a pass-through
/// consumer never waits on it. Consumers that want one item per message feed
/// the segments here instead.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    partial: Vec<u8>,
}

impl MessageAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one segment. Returns the finished message when `segment` completes one.
    pub fn push(&mut self, segment: Emitted) -> Option<Vec<u8>> {
        let Emitted::Frame { bytes, complete } = segment else {
            return None;
        };

        if !complete {
            self.partial.extend_from_slice(&bytes);
            return None;
        }

        if self.partial.is_empty() {
            return Some(bytes);
        }

        let mut message = std::mem::take(&mut self.partial);
        message.extend_from_slice(&bytes);
        Some(message)
    }

    /// Bytes of a message that has started but not finished.
    #[must_use]
    pub fn partial_len(&self) -> usize {
        self.partial.len()
    }
}
