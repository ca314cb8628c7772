use crate::{
    database::{DatabaseObjectStore, DatabaseRetryConfig},
    filesystem::FilesystemObjectStore,
    memory::MemoryObjectStore,
    ObjectStore,
};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Storage backend type
pub enum StorageBackend {
    /// Process-local storage, lost on restart
    Memory,
    /// Filesystem storage with data directory path
    Filesystem(PathBuf),
    /// Database storage with database URL
    Database {
        database_url: String,
        retry_config: Option<DatabaseRetryConfig>,
    },
}

impl StorageBackend {
    /// Initialize storage backend based on type
    pub async fn initialize(self) -> Result<Arc<dyn ObjectStore>> {
        match self {
            StorageBackend::Memory => Ok(Arc::new(MemoryObjectStore::new())),
            StorageBackend::Filesystem(data_dir) => {
                let store = FilesystemObjectStore::open(data_dir).await?;
                Ok(Arc::new(store))
            }
            StorageBackend::Database {
                database_url,
                retry_config,
            } => {
                let store =
                    DatabaseObjectStore::connect(&database_url, retry_config.unwrap_or_default())
                        .await?;
                Ok(Arc::new(store))
            }
        }
    }
}
