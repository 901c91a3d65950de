//! Log streaming
//!
//! A [`LogStream`] is the lazy, possibly endless sequence of output lines the
//! orchestrator hands back for a followed service. The pipeline pulls lines
//! one at a time and passes each to a [`LogSink`] as soon as it arrives.
//!
//! Whoever pulls from a stream owns it and must call [`LogStream::close`] on
//! every exit path. Implementations should additionally release their
//! resources on drop.

use crate::tooling::{LogLine, StreamError};
use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// A cancellable sequence of log lines
#[async_trait]
pub trait LogStream: Send {
    /// Wait for the next line
    ///
    /// `None` means the stream has ended cleanly. After an `Err` item the
    /// stream yields `None`.
    async fn next_line(&mut self) -> Option<Result<LogLine, StreamError>>;

    /// Release the underlying resources; calling it twice is harmless
    async fn close(&mut self);
}

/// Boxed stream for dynamic dispatch
pub type BoxedLogStream = Box<dyn LogStream>;

/// Receives log lines as they arrive
///
/// This trait is object-safe and can be used as `&dyn LogSink`.
pub trait LogSink: Send + Sync {
    /// Called once per line, in arrival order
    ///
    /// An error means the sink can no longer take output (e.g. stdout was
    /// closed); the caller stops feeding it.
    fn on_line(&self, line: &LogLine) -> io::Result<()>;
}

/// Sink that discards everything
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn on_line(&self, _line: &LogLine) -> io::Result<()> {
        Ok(())
    }
}

/// Read one newline-terminated line, decoding invalid UTF-8 lossily
///
/// Returns `Ok(None)` at end of input. The trailing `\n` or `\r\n` is stripped.
pub(crate) async fn read_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}
