//! Record source and payload sink collaborators.
//!
//! The sender pulls records from a [`Source`]; the receiver pushes delivered
//! payloads into a [`Sink`].  The CLI uses [`LineSource`] over a file and
//! [`WriterSink`] over an output file; tests use the `VecDeque` and `Vec`
//! implementations.

use std::collections::VecDeque;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Lazy, finite sequence of records to send.
#[allow(async_fn_in_trait)]
pub trait Source {
    /// The next record, or `None` once the source is exhausted.
    async fn next_record(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// Append-only destination for delivered payloads.
#[allow(async_fn_in_trait)]
pub trait Sink {
    async fn append(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Yields successive lines of a reader, each including its `\n`.
///
/// The final line is yielded as-is if the input does not end in a newline.
#[derive(Debug)]
pub struct LineSource<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: AsyncBufRead + Unpin> Source for LineSource<R> {
    async fn next_record(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line).await?;
        Ok((n > 0).then_some(line))
    }
}

impl Source for VecDeque<Vec<u8>> {
    async fn next_record(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.pop_front())
    }
}

/// Writes each payload to an async writer and flushes it.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin> Sink for WriterSink<W> {
    async fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await
    }
}

impl Sink for Vec<u8> {
    async fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}
