//! Display helpers for bytes that did not belong to any message.

use std::borrow::Cow;

/// Render discarded server output as log-safe text.
///
/// Invalid UTF-8 is replaced, and control characters other than newline and
/// tab are shown escaped (`\u{1b}`) so server output can't drive the
/// terminal of whoever tails the log.
#[must_use]
pub fn noise_text(bytes: &[u8]) -> Cow<'_, str> {
    let text = String::from_utf8_lossy(bytes);
    if !text.chars().any(needs_escape) {
        return text;
    }

    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if needs_escape(c) {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

fn needs_escape(c: char) -> bool {
    c.is_control() && !matches!(c, '\n' | '\t')
}
