pub mod backend;
pub mod database;
pub mod filesystem;
pub mod listing;
pub mod memory;
pub mod stream;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

pub use backend::StorageBackend;
pub use database::{DatabaseObjectStore, DatabaseRetryConfig};
pub use filesystem::FilesystemObjectStore;
pub use memory::{MemoryObjectStore, StoreOperation};

/// Separator that marks directory markers in the flat key space
pub const KEY_SEPARATOR: char = '/';

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Object store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn unavailable<E: std::fmt::Display>(msg: &str, e: E) -> Self {
        StoreError::Unavailable(format!("{}: {}", msg, e))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Attach a message to a backend failure, in the manner of `anyhow::Context`
pub trait StoreContext<T> {
    fn store_context(self, msg: &str) -> StoreResult<T>;
}

impl<T, E: std::fmt::Display> StoreContext<T> for Result<T, E> {
    fn store_context(self, msg: &str) -> StoreResult<T> {
        self.map_err(|e| StoreError::unavailable(msg, e))
    }
}

/// Object content, delivered in chunks
pub type ByteStream = BoxStream<'static, StoreResult<Bytes>>;

/// Lazy, possibly failing listing of objects, sorted by key
pub type ObjectListing = BoxStream<'static, StoreResult<ObjectEntry>>;

/// One item of an object listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    /// Zero-byte directory marker (key ends with the separator)
    pub is_marker: bool,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        let key = key.into();
        let is_marker = key.ends_with(KEY_SEPARATOR);
        Self {
            key,
            size,
            is_marker,
        }
    }
}

/// Capability set of the flat, key-based object store.
///
/// Keys are opaque UTF-8 strings. Implementations must be safe for
/// concurrent use on disjoint keys; no multi-key transaction is offered.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Check whether an object exists under exactly this key
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        match self.stat(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Size of the object in bytes, `StoreError::NotFound` if absent
    async fn stat(&self, key: &str) -> StoreResult<u64>;

    /// Every object whose key starts with `prefix`, sorted by key
    fn scan(&self, prefix: &str) -> ObjectListing;

    /// List objects under `prefix`.
    ///
    /// A non-recursive listing yields only direct children: objects with no
    /// further separator after the prefix, plus one marker entry per child
    /// directory (including directories implied only by deeper keys).
    fn list(&self, prefix: &str, recursive: bool) -> ObjectListing {
        let listing = self.scan(prefix);
        if recursive {
            listing
        } else {
            listing::direct_children(listing, prefix)
        }
    }

    /// Store `length` bytes under `key`, overwriting any existing object
    async fn put(
        &self,
        key: &str,
        content: ByteStream,
        length: u64,
        content_type: Option<&str>,
    ) -> StoreResult<()>;

    /// Server-side copy, `StoreError::NotFound` if the source is absent
    async fn copy(&self, source: &str, destination: &str) -> StoreResult<()>;

    /// Delete an object (idempotent)
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Stream the object's content, `StoreError::NotFound` if absent
    async fn get_stream(&self, key: &str) -> StoreResult<ByteStream>;
}

/// Fail a put whose stream did not deliver the declared length
pub(crate) fn check_length(key: &str, expected: u64, received: u64) -> StoreResult<()> {
    if expected != received {
        return Err(StoreError::Unavailable(format!(
            "Expected {} bytes for {}, received {}",
            expected, key, received
        )));
    }
    Ok(())
}
