//! Streaming ZIP archival of a folder's objects

use crate::StorageError;
use async_zip::base::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use futures::io::{AsyncWrite, AsyncWriteExt};
use futures::TryStreamExt;
use storage::ByteStream;
use tracing::debug;

/// What an archive ended up holding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: usize,
    pub bytes: u64,
}

/// Writes one deflated ZIP entry per object into a sink.
///
/// The sink only needs to accept writes: entry sizes and checksums follow
/// each entry's data in a data descriptor, so the archive goes out as it is
/// produced and no object is held in memory whole. The ZIP writer is only
/// created with the first entry: an archive without entries never touches
/// the sink.
pub struct ArchiveStreamer<W: AsyncWrite + Unpin> {
    sink: Option<W>,
    writer: Option<ZipFileWriter<W>>,
    entries: usize,
    bytes: u64,
}

fn write_failed(e: impl std::fmt::Display) -> StorageError {
    StorageError::operation_failed(format!("Failed to write archive: {}", e))
}

impl<W: AsyncWrite + Unpin> ArchiveStreamer<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Some(sink),
            writer: None,
            entries: 0,
            bytes: 0,
        }
    }

    fn writer(&mut self) -> Result<&mut ZipFileWriter<W>, StorageError> {
        if self.writer.is_none() {
            let sink = self
                .sink
                .take()
                .ok_or_else(|| StorageError::operation_failed("Archive sink already consumed"))?;
            self.writer = Some(ZipFileWriter::new(sink));
        }
        self.writer
            .as_mut()
            .ok_or_else(|| StorageError::operation_failed("Archive writer unavailable"))
    }

    /// Append `content` (declared `size` bytes) as entry `name`
    pub async fn add_entry(
        &mut self,
        name: &str,
        size: u64,
        mut content: ByteStream,
    ) -> Result<(), StorageError> {
        let builder = ZipEntryBuilder::new(name.to_string().into(), Compression::Deflate);
        let mut entry = self
            .writer()?
            .write_entry_stream(builder)
            .await
            .map_err(write_failed)?;

        let mut written = 0u64;
        while let Some(chunk) = content.try_next().await? {
            entry.write_all(&chunk).await.map_err(write_failed)?;
            written += chunk.len() as u64;
        }
        entry.close().await.map_err(write_failed)?;
        if written != size {
            return Err(StorageError::operation_failed(format!(
                "Object {} changed while archiving: expected {} bytes, read {}",
                name, size, written
            )));
        }

        debug!(entry = name, size = written, "Archived entry");
        self.entries += 1;
        self.bytes += written;
        Ok(())
    }

    /// Write the central directory; fails if no entry was added
    pub async fn finish(mut self) -> Result<ArchiveSummary, StorageError> {
        let Some(writer) = self.writer.take() else {
            return Err(StorageError::operation_failed("Folder is empty"));
        };
        let mut sink = writer.close().await.map_err(write_failed)?;
        sink.flush().await.map_err(write_failed)?;
        Ok(ArchiveSummary {
            entries: self.entries,
            bytes: self.bytes,
        })
    }
}
