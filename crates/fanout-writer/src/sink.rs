//! Output sinks shared by every writer task.

use futures::future::BoxFuture;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// A destination for whole lines, shared across concurrent tasks.
///
/// `write_line` takes `&self`: every task of a batch holds the same sink
/// behind an `Arc`, and the implementation decides how (or whether) to
/// serialize concurrent calls.
pub trait LineSink: Send + Sync + 'static {
    /// Writes one line, terminator included.
    fn write_line<'a>(&'a self, line: &'a [u8]) -> BoxFuture<'a, io::Result<()>>;
}

impl<S: LineSink + ?Sized> LineSink for Arc<S> {
    fn write_line<'a>(&'a self, line: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        (**self).write_line(line)
    }
}

impl<S: LineSink + ?Sized> LineSink for Box<S> {
    fn write_line<'a>(&'a self, line: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        (**self).write_line(line)
    }
}

/// Adapts any [`AsyncWrite`] into a [`LineSink`].
///
/// Each line is written with a single `write_all` under an async mutex and
/// then flushed, so lines never interleave at the byte level. The order of
/// lines across tasks is still unspecified.
///
/// # Example
///
/// ```rust
/// use fanout_writer::{LineSink, WriterSink};
///
/// # async fn example() -> std::io::Result<()> {
/// let sink = WriterSink::new(Vec::new());
/// sink.write_line(b"one\n").await?;
/// assert_eq!(sink.into_inner(), b"one\n");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W> WriterSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<tokio::io::Stdout> {
    /// A sink over the process's standard output.
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> LineSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn write_line<'a>(&'a self, line: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            let mut writer = self.writer.lock().await;
            writer.write_all(line).await?;
            writer.flush().await
        })
    }
}
