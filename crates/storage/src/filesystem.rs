//! Filesystem-based object store
//!
//! Keys are hex-encoded so the key space stays flat regardless of the
//! separators a key contains. Long encodings are split into bounded path
//! components to respect filename limits; the final component carries the
//! `.obj` suffix so it can never collide with a component directory.

use crate::{
    check_length, stream, ByteStream, ObjectEntry, ObjectListing, ObjectStore, StoreContext,
    StoreError, StoreResult,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const OBJECTS_DIR: &str = "objects";
const TMP_DIR: &str = "tmp";
const OBJECT_SUFFIX: &str = ".obj";
const MAX_COMPONENT_LEN: usize = 200;

/// Filesystem-based object store
pub struct FilesystemObjectStore {
    data_dir: PathBuf,
}

impl FilesystemObjectStore {
    /// Open (and create if needed) a store rooted at `data_dir`
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(data_dir.join(OBJECTS_DIR))
            .await
            .context("Failed to create objects directory")?;
        tokio::fs::create_dir_all(data_dir.join(TMP_DIR))
            .await
            .context("Failed to create temp directory")?;
        Ok(Self { data_dir })
    }

    fn objects_dir(&self) -> PathBuf {
        self.data_dir.join(OBJECTS_DIR)
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.objects_dir().join(encode_key(key))
    }

    fn temp_path(&self) -> PathBuf {
        self.data_dir
            .join(TMP_DIR)
            .join(format!("{}.tmp", uuid::Uuid::new_v4()))
    }

    /// Move a fully written temp file into place
    async fn commit(&self, temp_path: &Path, key: &str) -> StoreResult<()> {
        let object_path = self.object_path(key);
        if let Some(parent) = object_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .store_context("Failed to create object directory")?;
        }
        tokio::fs::rename(temp_path, &object_path)
            .await
            .store_context("Failed to move object into place")
    }

    async fn write_temp(&self, temp_path: &Path, mut content: ByteStream) -> StoreResult<u64> {
        let mut file = tokio::fs::File::create(temp_path)
            .await
            .store_context("Failed to create temp file")?;
        let mut written = 0u64;
        while let Some(chunk) = content.try_next().await? {
            file.write_all(&chunk)
                .await
                .store_context("Failed to write object")?;
            written += chunk.len() as u64;
        }
        file.sync_all()
            .await
            .store_context("Failed to sync object to disk")?;
        Ok(written)
    }
}

/// Relative path of the file holding `key`
fn encode_key(key: &str) -> PathBuf {
    let encoded = hex::encode(key.as_bytes());
    let mut path = PathBuf::new();
    let mut rest = encoded.as_str();
    while rest.len() > MAX_COMPONENT_LEN {
        let (component, tail) = rest.split_at(MAX_COMPONENT_LEN);
        path.push(component);
        rest = tail;
    }
    path.push(format!("{}{}", rest, OBJECT_SUFFIX));
    path
}

/// Whether a directory holding hex `accumulated` can contain keys encoded with hex `wanted`
fn may_contain(accumulated: &str, wanted: &str) -> bool {
    accumulated.starts_with(wanted) || wanted.starts_with(accumulated)
}

fn not_found_or<T>(result: std::io::Result<T>, key: &str, msg: &str) -> StoreResult<T> {
    result.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            StoreError::NotFound(key.to_string())
        } else {
            StoreError::unavailable(msg, e)
        }
    })
}

/// Walk the object tree and collect every key starting with `prefix`
async fn scan_dir(objects_dir: PathBuf, prefix: String) -> StoreResult<Vec<ObjectEntry>> {
    let wanted = hex::encode(prefix.as_bytes());
    let mut entries = Vec::new();
    let mut pending = vec![(objects_dir, String::new())];

    while let Some((dir, accumulated)) = pending.pop() {
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(StoreError::unavailable("Failed to read object directory", e)),
        };

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .store_context("Failed to read object directory")?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let file_type = entry
                .file_type()
                .await
                .store_context("Failed to read object type")?;

            if file_type.is_dir() {
                let nested = format!("{}{}", accumulated, name);
                if may_contain(&nested, &wanted) {
                    pending.push((entry.path(), nested));
                }
                continue;
            }

            let Some(stem) = name.strip_suffix(OBJECT_SUFFIX) else {
                continue;
            };
            let encoded = format!("{}{}", accumulated, stem);
            if !encoded.starts_with(&wanted) {
                continue;
            }
            let key = match hex::decode(&encoded).map(String::from_utf8) {
                Ok(Ok(key)) => key,
                _ => {
                    warn!("Skipping undecodable object file: {:?}", entry.path());
                    continue;
                }
            };
            let size = entry
                .metadata()
                .await
                .store_context("Failed to read object metadata")?
                .len();
            entries.push(ObjectEntry::new(key, size));
        }
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn stat(&self, key: &str) -> StoreResult<u64> {
        let metadata = not_found_or(
            tokio::fs::metadata(self.object_path(key)).await,
            key,
            "Failed to stat object",
        )?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(metadata.len())
    }

    fn scan(&self, prefix: &str) -> ObjectListing {
        futures::stream::once(scan_dir(self.objects_dir(), prefix.to_string()))
            .map_ok(|entries| futures::stream::iter(entries.into_iter().map(Ok::<_, StoreError>)))
            .try_flatten()
            .boxed()
    }

    async fn put(
        &self,
        key: &str,
        content: ByteStream,
        length: u64,
        _content_type: Option<&str>,
    ) -> StoreResult<()> {
        let temp_path = self.temp_path();
        let result = match self.write_temp(&temp_path, content).await {
            Ok(written) => match check_length(key, length, written) {
                Ok(()) => self.commit(&temp_path, key).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp_path).await;
        } else {
            debug!(key = key, size = length, "Stored object on disk");
        }
        result
    }

    async fn copy(&self, source: &str, destination: &str) -> StoreResult<()> {
        let temp_path = self.temp_path();
        not_found_or(
            tokio::fs::copy(self.object_path(source), &temp_path).await,
            source,
            "Failed to copy object",
        )?;
        let result = self.commit(&temp_path, destination).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp_path).await;
        }
        result
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match tokio::fs::remove_file(self.object_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::unavailable("Failed to delete object", e)),
        }
    }

    async fn get_stream(&self, key: &str) -> StoreResult<ByteStream> {
        let file = not_found_or(
            tokio::fs::File::open(self.object_path(key)).await,
            key,
            "Failed to open object",
        )?;
        Ok(stream::from_file(file))
    }
}
