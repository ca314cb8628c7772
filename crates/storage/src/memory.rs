//! In-memory object store, used by tests and the `memory` backend

use crate::{stream, ByteStream, ObjectEntry, ObjectListing, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Store operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Stat,
    List,
    Put,
    Copy,
    Delete,
    Get,
}

#[derive(Debug, Clone)]
struct StoredObject {
    content: Bytes,
    content_type: Option<String>,
}

/// Object store backed by a sorted map
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    failures: Arc<RwLock<Vec<(StoreOperation, String)>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `operation` on `key` fail with `StoreError::Unavailable`.
    /// For `StoreOperation::List` the key is matched against the prefix.
    pub fn inject_failure(&self, operation: StoreOperation, key: impl Into<String>) {
        if let Ok(mut failures) = self.failures.write() {
            failures.push((operation, key.into()));
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.write() {
            failures.clear();
        }
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Content type recorded for `key`, if any
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.get(key).and_then(|o| o.content_type.clone()))
    }

    fn check_failure(&self, operation: StoreOperation, key: &str) -> StoreResult<()> {
        let failures = self
            .failures
            .read()
            .map_err(|e| StoreError::unavailable("Failure registry poisoned", e))?;
        if failures.iter().any(|(op, k)| *op == operation && k == key) {
            return Err(StoreError::Unavailable(format!(
                "Injected {:?} failure for {}",
                operation, key
            )));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<String, StoredObject>>> {
        self.objects
            .read()
            .map_err(|e| StoreError::unavailable("Object map poisoned", e))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<String, StoredObject>>> {
        self.objects
            .write()
            .map_err(|e| StoreError::unavailable("Object map poisoned", e))
    }

    fn snapshot(&self, prefix: &str) -> StoreResult<Vec<ObjectEntry>> {
        self.check_failure(StoreOperation::List, prefix)?;
        let objects = self.read()?;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectEntry::new(key.clone(), object.content.len() as u64))
            .collect())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn stat(&self, key: &str) -> StoreResult<u64> {
        self.check_failure(StoreOperation::Stat, key)?;
        self.read()?
            .get(key)
            .map(|object| object.content.len() as u64)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn scan(&self, prefix: &str) -> ObjectListing {
        match self.snapshot(prefix) {
            Ok(entries) => futures::stream::iter(entries.into_iter().map(Ok::<_, StoreError>)).boxed(),
            Err(e) => futures::stream::once(futures::future::ready(Err(e))).boxed(),
        }
    }

    async fn put(
        &self,
        key: &str,
        content: ByteStream,
        length: u64,
        content_type: Option<&str>,
    ) -> StoreResult<()> {
        self.check_failure(StoreOperation::Put, key)?;
        let content = stream::collect(key, content, length).await?;
        self.write()?.insert(
            key.to_string(),
            StoredObject {
                content,
                content_type: content_type.map(str::to_string),
            },
        );
        debug!(key = key, size = length, "Stored object");
        Ok(())
    }

    async fn copy(&self, source: &str, destination: &str) -> StoreResult<()> {
        self.check_failure(StoreOperation::Copy, source)?;
        let mut objects = self.write()?;
        let object = objects
            .get(source)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(source.to_string()))?;
        objects.insert(destination.to_string(), object);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_failure(StoreOperation::Delete, key)?;
        self.write()?.remove(key);
        Ok(())
    }

    async fn get_stream(&self, key: &str) -> StoreResult<ByteStream> {
        self.check_failure(StoreOperation::Get, key)?;
        let content = self
            .read()?
            .get(key)
            .map(|object| object.content.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(stream::from_bytes(content))
    }
}
