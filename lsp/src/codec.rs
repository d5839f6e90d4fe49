//! Strict `Content-Length` framing for the editor side of the proxy.
//!
//! The editor speaks clean LSP, so unlike the server side there is nothing to
//! sanitize: any framing violation is an error. [`FrameReader`] yields raw
//! message bodies and [`FrameWriter`] frames raw bodies, so payloads pass
//! through without being re-encoded.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum body size (64 MiB) accepted from the editor.
const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Reads framed message bodies from an async reader.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next message body.
    ///
    /// Returns `Ok(None)` on EOF between frames.
    /// Returns `Err` on malformed headers, oversized frames, or EOF mid-frame.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(content_length) = self.read_headers().await? else {
            return Ok(None);
        };

        if content_length > MAX_FRAME_BYTES {
            bail!("Content-Length {content_length} exceeds maximum {MAX_FRAME_BYTES}");
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading frame body")?;

        Ok(Some(body))
    }

    async fn read_headers(&mut self) -> Result<Option<usize>> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();
        let mut saw_any_header_bytes = false;

        loop {
            line.clear();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .await
                .context("reading header line")?;

            if bytes_read == 0 {
                if !saw_any_header_bytes {
                    return Ok(None);
                }
                bail!("unexpected EOF while reading headers");
            }
            saw_any_header_bytes = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }

            // Header names are case-insensitive; Content-Type and friends are ignored.
            if let Some((key, value)) = trimmed.split_once(':')
                && key.eq_ignore_ascii_case("Content-Length")
            {
                let len: usize = value
                    .trim()
                    .parse()
                    .context("invalid Content-Length value")?;
                content_length = Some(len);
            }
        }

        match content_length {
            Some(len) => Ok(Some(len)),
            None => bail!("missing Content-Length header"),
        }
    }
}

/// Writes framed message bodies to an async writer.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write `body` behind a `Content-Length` header and flush.
    pub async fn write_body(&mut self, body: &[u8]) -> Result<()> {
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .context("writing frame header")?;
        self.writer
            .write_all(body)
            .await
            .context("writing frame body")?;
        self.writer.flush().await.context("flushing frame")?;

        Ok(())
    }
}
