//! Helpers for building and draining object byte streams

use crate::{check_length, ByteStream, StoreError, StoreResult};
use bytes::{Bytes, BytesMut};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt, TryStreamExt};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncReadExt;

/// Read size used when streaming from local files
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Stream that yields `data` as a single chunk
pub fn from_bytes(data: impl Into<Bytes>) -> ByteStream {
    futures::stream::once(futures::future::ready(Ok(data.into()))).boxed()
}

/// Stream that yields nothing (directory markers)
pub fn empty() -> ByteStream {
    futures::stream::empty().boxed()
}

/// Stream a local file in `CHUNK_SIZE` chunks without reading it whole
pub fn from_file(file: tokio::fs::File) -> ByteStream {
    futures::stream::try_unfold(file, |mut file| async move {
        let mut buffer = BytesMut::with_capacity(CHUNK_SIZE);
        let read = match file.read_buf(&mut buffer).await {
            Ok(read) => read,
            Err(e) => return Err(StoreError::unavailable("Failed to read file", e)),
        };
        if read == 0 {
            Ok(None)
        } else {
            Ok(Some((buffer.freeze(), file)))
        }
    })
    .boxed()
}

/// Drain a stream into memory, checking it delivered `expected` bytes
pub async fn collect(key: &str, mut content: ByteStream, expected: u64) -> StoreResult<Bytes> {
    let mut buffer = BytesMut::with_capacity(expected.min(CHUNK_SIZE as u64 * 16) as usize);
    while let Some(chunk) = content.try_next().await? {
        buffer.extend_from_slice(&chunk);
    }
    check_length(key, expected, buffer.len() as u64)?;
    Ok(buffer.freeze())
}

/// Writing half of a [`pipe`]
#[derive(Clone)]
pub struct PipeWriter {
    sender: mpsc::Sender<StoreResult<Bytes>>,
}

/// Bounded in-memory pipe: bytes written to the [`PipeWriter`] come out of
/// the returned stream in order.
///
/// At most `capacity` chunks (plus one per writer) are buffered; further
/// writes wait for the reader. The stream ends once every writer is dropped.
pub fn pipe(capacity: usize) -> (PipeWriter, ByteStream) {
    let (sender, receiver) = mpsc::channel(capacity);
    (PipeWriter { sender }, receiver.boxed())
}

impl PipeWriter {
    /// End the reading side with `error`, after everything already written
    pub async fn abort(mut self, error: StoreError) {
        // The reader may be gone already; nobody is left to tell then
        let _ = self.sender.send(Err(error)).await;
    }
}

fn reader_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "Pipe reader was dropped")
}

impl futures::io::AsyncWrite for PipeWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        match self.sender.poll_ready(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(_)) => return Poll::Ready(Err(reader_gone())),
            Poll::Ready(Ok(())) => {}
        }
        match self.sender.start_send(Ok(Bytes::copy_from_slice(buf))) {
            Ok(()) => Poll::Ready(Ok(buf.len())),
            Err(_) => Poll::Ready(Err(reader_gone())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.sender.disconnect();
        Poll::Ready(Ok(()))
    }
}
