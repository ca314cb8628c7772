//! Per-user virtual drive on top of a flat object store

use crate::archive::ArchiveStreamer;
use crate::executor::FanOutExecutor;
use crate::StorageError;
use common::path_utils::{
    is_directory_path, name_of, normalize, normalize_directory, object_key, parent_of,
    relative_descriptor, to_descriptor, user_root, validate_item_name, SEPARATOR,
};
use common::{ResourceDescriptor, ResourceKind};
use futures::io::{AsyncWrite, AsyncWriteExt};
use futures::TryStreamExt;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use storage::{stream, ByteStream, ObjectEntry, ObjectStore, StoreError};
use tracing::{debug, info, warn};

/// One file of an upload batch
pub struct UploadItem {
    /// File name, optionally with a relative sub-path
    pub name: String,
    pub content: ByteStream,
    pub size: u64,
    pub content_type: Option<String>,
}

/// Result of a download written to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Suggested attachment name (`<folder>.zip` for folders)
    pub file_name: String,
    pub kind: ResourceKind,
    pub entries: usize,
    pub bytes: u64,
}

/// A resource that exists in the store, with its canonical path
struct Resolved {
    path: String,
    descriptor: ResourceDescriptor,
}

/// Orchestrates single and multi-object operations for all users.
///
/// Holds no per-request state; every operation is scoped by the user id
/// it is given and only touches keys under that user's root.
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn ObjectStore>,
    executor: FanOutExecutor,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStore>, workers: usize) -> Self {
        Self {
            store,
            executor: FanOutExecutor::new(workers),
        }
    }

    pub fn workers(&self) -> usize {
        self.executor.workers()
    }

    /// Round trip to the object store
    pub async fn probe(&self) -> Result<(), StorageError> {
        self.store.exists(&user_root(0)).await?;
        Ok(())
    }

    /// Look up `path` as a file first, then as a directory of the same name
    async fn resolve(&self, user_id: u64, path: &str) -> Result<Option<Resolved>, StorageError> {
        if is_directory_path(path) {
            if self.store.exists(&object_key(user_id, path)).await? {
                return Ok(Some(Resolved {
                    path: path.to_string(),
                    descriptor: to_descriptor(path, None, ResourceKind::Directory),
                }));
            }
            return Ok(None);
        }

        match self.store.stat(&object_key(user_id, path)).await {
            Ok(size) => {
                return Ok(Some(Resolved {
                    path: path.to_string(),
                    descriptor: to_descriptor(path, Some(size), ResourceKind::File),
                }))
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let directory = format!("{}{}", path, SEPARATOR);
        if self.store.exists(&object_key(user_id, &directory)).await? {
            return Ok(Some(Resolved {
                descriptor: to_descriptor(&directory, None, ResourceKind::Directory),
                path: directory,
            }));
        }
        Ok(None)
    }

    async fn directory_exists(&self, user_id: u64, directory: &str) -> Result<bool, StorageError> {
        if directory.is_empty() {
            return Ok(true);
        }
        Ok(self.store.exists(&object_key(user_id, directory)).await?)
    }

    async fn list_entries(
        &self,
        prefix: &str,
        recursive: bool,
    ) -> Result<Vec<ObjectEntry>, StorageError> {
        Ok(self.store.list(prefix, recursive).try_collect().await?)
    }

    pub async fn get_resource(
        &self,
        path: &str,
        user_id: u64,
    ) -> Result<ResourceDescriptor, StorageError> {
        let path = normalize(path)?;
        if path.is_empty() {
            return Ok(ResourceDescriptor::root());
        }
        match self.resolve(user_id, &path).await? {
            Some(resolved) => Ok(resolved.descriptor),
            None => Err(StorageError::NotFound(path)),
        }
    }

    /// Fail with `NotFound` unless the resource exists
    pub async fn ensure_exists(&self, path: &str, user_id: u64) -> Result<(), StorageError> {
        self.get_resource(path, user_id).await.map(|_| ())
    }

    pub async fn create_directory(
        &self,
        path: &str,
        user_id: u64,
    ) -> Result<ResourceDescriptor, StorageError> {
        let path = normalize_directory(path)?;
        if path.is_empty() {
            return Err(StorageError::AlreadyExists(
                "The root directory always exists".to_string(),
            ));
        }
        if self.resolve(user_id, name_path(&path)).await?.is_some() {
            return Err(StorageError::AlreadyExists(path));
        }
        let parent = parent_of(&path);
        if !self.directory_exists(user_id, parent).await? {
            return Err(StorageError::NotFound(format!(
                "Parent directory {} does not exist",
                parent
            )));
        }

        self.store
            .put(&object_key(user_id, &path), stream::empty(), 0, None)
            .await?;
        info!(user_id = user_id, path = %path, "Created directory");
        Ok(to_descriptor(&path, None, ResourceKind::Directory))
    }

    pub async fn list_directory(
        &self,
        path: &str,
        user_id: u64,
    ) -> Result<Vec<ResourceDescriptor>, StorageError> {
        let path = normalize_directory(path)?;
        if !self.directory_exists(user_id, &path).await? {
            return Err(StorageError::NotFound(path));
        }

        let prefix = object_key(user_id, &path);
        let entries = self.list_entries(&prefix, false).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.key != prefix)
            .filter_map(|entry| relative_descriptor(user_id, &entry.key, entry.size))
            .collect())
    }

    /// Store every item under the directory `path`.
    ///
    /// The target directory and any intermediate directories of folder
    /// uploads are created when missing, provided the target's parent
    /// exists. Items are validated up front; storing then runs concurrently
    /// and a failed item does not undo the ones that were stored.
    pub async fn upload_batch(
        &self,
        path: &str,
        user_id: u64,
        items: Vec<UploadItem>,
    ) -> Result<Vec<ResourceDescriptor>, StorageError> {
        if items.is_empty() {
            return Err(StorageError::BadRequest("No files to upload".to_string()));
        }
        let directory = normalize_directory(path)?;

        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(items.len());
        for item in items {
            if item.name.trim().is_empty() {
                warn!(user_id = user_id, "Skipping upload item without a name");
                continue;
            }
            let name = validate_item_name(&item.name)?;
            let item_path = format!("{}{}", directory, name);
            if !seen.insert(item_path.clone()) {
                return Err(StorageError::BadRequest(format!(
                    "Duplicate file name in upload: {}",
                    name
                )));
            }
            prepared.push((item_path, item));
        }
        if prepared.is_empty() {
            return Err(StorageError::BadRequest("No files to upload".to_string()));
        }

        // Directories the batch needs, parents sorting before their children
        let mut required = BTreeSet::new();
        if !directory.is_empty() {
            required.insert(directory.clone());
        }
        for (item_path, _) in &prepared {
            let mut parent = parent_of(item_path);
            while parent.len() > directory.len() {
                required.insert(parent.to_string());
                parent = parent_of(parent);
            }
        }
        if let Some((item_path, _)) = prepared
            .iter()
            .find(|(item_path, _)| required.contains(&format!("{}{}", item_path, SEPARATOR)))
        {
            return Err(StorageError::BadRequest(format!(
                "{} is uploaded both as a file and as a directory",
                item_path
            )));
        }

        let parent = parent_of(&directory);
        if !self.directory_exists(user_id, parent).await? {
            return Err(StorageError::NotFound(format!(
                "Parent directory {} does not exist",
                parent
            )));
        }

        let mut missing = Vec::new();
        for sub_directory in required {
            match self.resolve(user_id, name_path(&sub_directory)).await? {
                Some(existing) if existing.descriptor.is_directory() => {}
                Some(existing) => return Err(StorageError::AlreadyExists(existing.path)),
                None => missing.push(sub_directory),
            }
        }
        for sub_directory in missing {
            self.store
                .put(&object_key(user_id, &sub_directory), stream::empty(), 0, None)
                .await?;
            debug!(user_id = user_id, path = %sub_directory, "Created upload directory");
        }

        let descriptors: Vec<ResourceDescriptor> = prepared
            .iter()
            .map(|(item_path, item)| to_descriptor(item_path, Some(item.size), ResourceKind::File))
            .collect();

        let tasks = prepared
            .into_iter()
            .map(|(item_path, item)| {
                let store = self.store.clone();
                let key = object_key(user_id, &item_path);
                let task_key = key.clone();
                let task = async move {
                    if store.exists(&task_key).await?
                        || store.exists(&format!("{}{}", task_key, SEPARATOR)).await?
                    {
                        return Err(StorageError::AlreadyExists(item_path));
                    }
                    store
                        .put(
                            &task_key,
                            item.content,
                            item.size,
                            item.content_type.as_deref(),
                        )
                        .await?;
                    Ok::<(), StorageError>(())
                };
                (key, task)
            })
            .collect();

        let uploaded = self.executor.join_all("upload", tasks).await.into_result()?;
        info!(
            user_id = user_id,
            path = %directory,
            files = uploaded,
            "Uploaded files"
        );
        Ok(descriptors)
    }

    /// Delete a file, or a directory with everything below it.
    ///
    /// The directory marker is removed last and only if every descendant
    /// was deleted, so a partial failure leaves the directory visible.
    pub async fn delete_resource(&self, path: &str, user_id: u64) -> Result<(), StorageError> {
        let path = normalize(path)?;
        if path.is_empty() {
            return Err(StorageError::BadRequest(
                "The root directory cannot be deleted".to_string(),
            ));
        }
        let resolved = self
            .resolve(user_id, &path)
            .await?
            .ok_or_else(|| StorageError::NotFound(path.clone()))?;
        let key = object_key(user_id, &resolved.path);

        if !resolved.descriptor.is_directory() {
            self.store.delete(&key).await?;
            info!(user_id = user_id, path = %resolved.path, "Deleted file");
            return Ok(());
        }

        let tasks: Vec<_> = self
            .list_entries(&key, true)
            .await?
            .into_iter()
            .filter(|entry| entry.key != key)
            .map(|entry| {
                let store = self.store.clone();
                let task_key = entry.key.clone();
                let task = async move {
                    store.delete(&task_key).await?;
                    Ok::<(), StorageError>(())
                };
                (entry.key, task)
            })
            .collect();

        let deleted = self.executor.join_all("delete", tasks).await.into_result()?;
        self.store.delete(&key).await?;
        info!(
            user_id = user_id,
            path = %resolved.path,
            objects = deleted + 1,
            "Deleted directory"
        );
        Ok(())
    }

    /// Move (or rename) a file or directory.
    ///
    /// A directory is moved object by object with copy then delete; a
    /// failure part way leaves objects under both the old and new paths.
    pub async fn move_resource(
        &self,
        from: &str,
        to: &str,
        user_id: u64,
    ) -> Result<ResourceDescriptor, StorageError> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        if from.is_empty() || to.is_empty() {
            return Err(StorageError::BadRequest(
                "The root directory cannot be moved".to_string(),
            ));
        }

        let source = self
            .resolve(user_id, &from)
            .await?
            .ok_or_else(|| StorageError::NotFound(from.clone()))?;

        let destination = if source.descriptor.is_directory() {
            let destination = normalize_directory(&to)?;
            if destination.starts_with(&source.path) {
                return Err(StorageError::BadRequest(format!(
                    "Cannot move {} into itself",
                    source.path
                )));
            }
            destination
        } else {
            if is_directory_path(&to) {
                return Err(StorageError::BadRequest(format!(
                    "Cannot move file {} to directory path {}",
                    source.path, to
                )));
            }
            to
        };

        if self
            .resolve(user_id, name_path(&destination))
            .await?
            .is_some()
        {
            return Err(StorageError::AlreadyExists(destination));
        }
        let parent = parent_of(&destination);
        if !self.directory_exists(user_id, parent).await? {
            return Err(StorageError::NotFound(format!(
                "Destination directory {} does not exist",
                parent
            )));
        }

        let source_key = object_key(user_id, &source.path);
        let destination_key = object_key(user_id, &destination);

        if !source.descriptor.is_directory() {
            self.store.copy(&source_key, &destination_key).await?;
            self.store.delete(&source_key).await?;
            info!(user_id = user_id, from = %source.path, to = %destination, "Moved file");
            return Ok(to_descriptor(
                &destination,
                source.descriptor.size,
                ResourceKind::File,
            ));
        }

        let tasks: Vec<_> = self
            .list_entries(&source_key, true)
            .await?
            .into_iter()
            .map(|entry| {
                let store = self.store.clone();
                let target = format!("{}{}", destination_key, &entry.key[source_key.len()..]);
                let task_key = entry.key.clone();
                let task = async move {
                    store.copy(&task_key, &target).await?;
                    store.delete(&task_key).await?;
                    Ok::<(), StorageError>(())
                };
                (entry.key, task)
            })
            .collect();

        let moved = self.executor.join_all("move", tasks).await.into_result()?;
        info!(
            user_id = user_id,
            from = %source.path,
            to = %destination,
            objects = moved,
            "Moved directory"
        );
        Ok(to_descriptor(&destination, None, ResourceKind::Directory))
    }

    /// Case-insensitive search on base names across the user's whole drive
    pub async fn search(
        &self,
        query: &str,
        user_id: u64,
    ) -> Result<Vec<ResourceDescriptor>, StorageError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StorageError::BadRequest(
                "Search query cannot be empty".to_string(),
            ));
        }
        let needle = query.to_lowercase();

        let entries = self.list_entries(&user_root(user_id), true).await?;
        let results: Vec<ResourceDescriptor> = entries
            .into_iter()
            .filter_map(|entry| relative_descriptor(user_id, &entry.key, entry.size))
            .filter(|descriptor| descriptor.name.to_lowercase().contains(&needle))
            .collect();

        debug!(user_id = user_id, query = query, matches = results.len(), "Search completed");
        Ok(results)
    }

    /// Resolve what `path` downloads as, without writing anything.
    ///
    /// Fails with `NotFound` for a missing resource and with
    /// `OperationFailed` for a directory without files, so callers can
    /// still report an error before they commit to a response.
    pub async fn open_download(&self, path: &str, user_id: u64) -> Result<Download, StorageError> {
        let path = normalize(path)?;
        let (path, kind) = if path.is_empty() || is_directory_path(&path) {
            if !self.directory_exists(user_id, &path).await? {
                return Err(StorageError::NotFound(path));
            }
            (path, ResourceKind::Directory)
        } else {
            let resolved = self
                .resolve(user_id, &path)
                .await?
                .ok_or_else(|| StorageError::NotFound(path.clone()))?;
            (resolved.path, resolved.descriptor.kind)
        };

        let file_name = match kind {
            ResourceKind::File => name_of(&path).to_string(),
            ResourceKind::Directory => {
                let has_files = self
                    .store
                    .list(&object_key(user_id, &path), true)
                    .try_filter(|entry| futures::future::ready(!entry.is_marker))
                    .try_next()
                    .await?
                    .is_some();
                if !has_files {
                    return Err(StorageError::operation_failed("Folder is empty"));
                }
                if path.is_empty() {
                    "root.zip".to_string()
                } else {
                    format!("{}.zip", name_of(&path))
                }
            }
        };

        Ok(Download {
            store: self.store.clone(),
            user_id,
            path,
            kind,
            file_name,
        })
    }

    /// Write a file's bytes, or a ZIP of a directory, into `sink`.
    ///
    /// An empty directory fails with `OperationFailed` and leaves the sink
    /// untouched.
    pub async fn download_resource<W: AsyncWrite + Unpin>(
        &self,
        path: &str,
        user_id: u64,
        sink: W,
    ) -> Result<DownloadSummary, StorageError> {
        self.open_download(path, user_id).await?.write_to(sink).await
    }
}

/// A resource resolved for download
pub struct Download {
    store: Arc<dyn ObjectStore>,
    user_id: u64,
    path: String,
    kind: ResourceKind,
    file_name: String,
}

impl Download {
    /// Suggested attachment name (`<folder>.zip` for folders)
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Stream the file, or the directory's ZIP archive, into `sink` as it
    /// is read from the store
    pub async fn write_to<W: AsyncWrite + Unpin>(
        self,
        sink: W,
    ) -> Result<DownloadSummary, StorageError> {
        match self.kind {
            ResourceKind::File => self.write_file(sink).await,
            ResourceKind::Directory => self.write_archive(sink).await,
        }
    }

    async fn write_archive<W: AsyncWrite + Unpin>(
        self,
        sink: W,
    ) -> Result<DownloadSummary, StorageError> {
        let prefix = object_key(self.user_id, &self.path);
        let mut listing = self.store.list(&prefix, true);
        let mut archive = ArchiveStreamer::new(sink);
        while let Some(entry) = listing.try_next().await? {
            if entry.is_marker {
                continue;
            }
            let content = self.store.get_stream(&entry.key).await?;
            archive
                .add_entry(&entry.key[prefix.len()..], entry.size, content)
                .await?;
        }
        let summary = archive.finish().await?;

        info!(
            user_id = self.user_id,
            path = %self.path,
            entries = summary.entries,
            bytes = summary.bytes,
            "Archived directory"
        );
        Ok(DownloadSummary {
            file_name: self.file_name,
            kind: ResourceKind::Directory,
            entries: summary.entries,
            bytes: summary.bytes,
        })
    }

    async fn write_file<W: AsyncWrite + Unpin>(
        self,
        mut sink: W,
    ) -> Result<DownloadSummary, StorageError> {
        let mut content = self
            .store
            .get_stream(&object_key(self.user_id, &self.path))
            .await?;
        let mut bytes = 0u64;
        while let Some(chunk) = content.try_next().await? {
            sink.write_all(&chunk).await.map_err(|e| {
                StorageError::operation_failed(format!("Failed to write download: {}", e))
            })?;
            bytes += chunk.len() as u64;
        }
        sink.flush().await.map_err(|e| {
            StorageError::operation_failed(format!("Failed to write download: {}", e))
        })?;

        debug!(user_id = self.user_id, path = %self.path, bytes = bytes, "Downloaded file");
        Ok(DownloadSummary {
            file_name: self.file_name,
            kind: ResourceKind::File,
            entries: 1,
            bytes,
        })
    }
}

/// Path without its trailing separator, so both the file and directory
/// forms of a name are checked by `resolve`
fn name_path(path: &str) -> &str {
    path.strip_suffix(SEPARATOR).unwrap_or(path)
}
