//! Newline-delimited JSON framing over async byte streams.
//!
//! One frame per line. A malformed line yields [`FrameError::Malformed`] but
//! leaves the reader positioned at the next line, so a caller may log the
//! error and keep reading; only I/O errors and EOF end the stream.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Framing errors.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Underlying stream failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A line was not a valid JSON value.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Reads one JSON value per line from an async byte stream.
pub struct FrameReader<R> {
    inner: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            inner: BufReader::new(stream),
            line: String::new(),
        }
    }

    /// Read the next frame. Returns `Ok(None)` on EOF. Blank lines are
    /// skipped.
    pub async fn next<T: DeserializeOwned>(&mut self) -> Result<Option<T>, FrameError> {
        loop {
            self.line.clear();
            let n = self.inner.read_line(&mut self.line).await?;
            if n == 0 {
                return Ok(None);
            }
            let frame = self.line.trim();
            if frame.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(frame)?));
        }
    }
}

/// Writes one JSON value per line to an async byte stream.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(stream: W) -> Self {
        Self { inner: stream }
    }

    /// Serialize `value`, terminate with a newline, write and flush.
    pub async fn write<T: Serialize>(&mut self, value: &T) -> Result<(), FrameError> {
        let mut frame = serde_json::to_string(value)?;
        frame.push('\n');
        self.inner.write_all(frame.as_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Close the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<(), FrameError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
