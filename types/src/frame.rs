//! Frame locator for `Content-Length` framed LSP messages.
//!
//! Finds the next well-formed header in a byte buffer that may also contain
//! arbitrary noise. The locator is a pure function: it never mutates its input
//! and keeps no state between calls, so the sanitizer can re-run it over a
//! growing buffer as chunks arrive.
//!
//! A header is the literal prefix [`HEADER_PREFIX`], a non-empty run of ASCII
//! decimal digits, and the separator [`HEADER_SEPARATOR`]:
//!
//! ```text
//! Content-Length: 42\r\n\r\n{...42 bytes of payload...}
//! ```

/// Literal, case-sensitive token that starts every header.
pub const HEADER_PREFIX: &[u8] = b"Content-Length: ";

/// Token separating the header from the payload.
pub const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Location of a header inside a buffer, plus its declared payload length.
///
/// `begin` is the offset of [`HEADER_PREFIX`], `end` is the offset just past
/// [`HEADER_SEPARATOR`]. The payload occupies `end..end + content_length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    begin: usize,
    end: usize,
    content_length: usize,
}

impl FrameHeader {
    #[must_use]
    pub fn begin(&self) -> usize {
        self.begin
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    #[must_use]
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Header bytes, prefix through separator.
    #[must_use]
    pub fn header_len(&self) -> usize {
        self.end - self.begin
    }

    /// Header plus payload bytes. Never overflows: [`locate_header`] rejects
    /// candidates whose frame length does not fit in `usize`.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.header_len() + self.content_length
    }
}

/// Find the first well-formed header in `buffer`.
///
/// Each occurrence of [`HEADER_PREFIX`] is a candidate. A candidate is accepted
/// when the next [`HEADER_SEPARATOR`] after it is preceded only by a non-empty
/// run of ASCII digits. Rejected candidates are skipped and the search resumes
/// after their prefix, so a prefix buried in diagnostic text never hides a real
/// header that follows it.
///
/// Returns `None` when no candidate is complete yet; the caller should wait for
/// more bytes.
#[must_use]
pub fn locate_header(buffer: &[u8]) -> Option<FrameHeader> {
    let mut search_from = 0;

    while let Some(begin) = find(buffer, HEADER_PREFIX, search_from) {
        let digits_begin = begin + HEADER_PREFIX.len();

        if let Some(separator) = find(buffer, HEADER_SEPARATOR, digits_begin)
            && let Some(content_length) = parse_length(&buffer[digits_begin..separator])
        {
            let end = separator + HEADER_SEPARATOR.len();
            if (end - begin).checked_add(content_length).is_some() {
                return Some(FrameHeader {
                    begin,
                    end,
                    content_length,
                });
            }
        }

        search_from = digits_begin;
    }

    None
}

/// Number of leading bytes of a header-less `buffer` that can never become
/// part of a header, whatever bytes arrive next.
///
/// A candidate stays live while everything after its prefix is a digit run
/// followed by a proper prefix of [`HEADER_SEPARATOR`]. Anything before the
/// first live candidate is noise. With no live candidate, only a trailing
/// partial [`HEADER_PREFIX`] is worth keeping.
///
/// Only meaningful when [`locate_header`] returned `None` for `buffer`.
#[must_use]
pub fn dead_prefix_len(buffer: &[u8]) -> usize {
    let mut search_from = 0;

    while let Some(begin) = find(buffer, HEADER_PREFIX, search_from) {
        let digits_begin = begin + HEADER_PREFIX.len();
        if is_live_tail(&buffer[digits_begin..]) {
            return begin;
        }
        search_from = digits_begin;
    }

    buffer.len() - partial_prefix_suffix_len(buffer)
}

fn is_live_tail(tail: &[u8]) -> bool {
    let digits = tail.iter().take_while(|b| b.is_ascii_digit()).count();
    let rest = &tail[digits..];
    rest.len() < HEADER_SEPARATOR.len() && HEADER_SEPARATOR.starts_with(rest)
}

/// Length of the longest suffix of `buffer` that is a proper prefix of
/// [`HEADER_PREFIX`].
fn partial_prefix_suffix_len(buffer: &[u8]) -> usize {
    (1..HEADER_PREFIX.len())
        .rev()
        .find(|&len| buffer.ends_with(&HEADER_PREFIX[..len]))
        .unwrap_or(0)
}

fn parse_length(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    digits.iter().try_fold(0usize, |acc, &d| {
        acc.checked_mul(10)?.checked_add(usize::from(d - b'0'))
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| from + pos)
}
