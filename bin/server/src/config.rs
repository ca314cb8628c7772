use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_HOST, DEFAULT_PORT, STORAGE_TYPE_DATABASE, STORAGE_TYPE_FILESYSTEM,
    STORAGE_TYPE_MEMORY,
};
use clap::{Arg, Command};
use std::ffi::OsString;
use std::path::PathBuf;
use storage::{DatabaseRetryConfig, StorageBackend};
use tracing::error;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Storage backend type
    pub storage_type: StorageType,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Data directory for filesystem storage
    pub data_dir: PathBuf,
    /// Database URL for database storage
    pub database_url: Option<String>,
    /// Database retry configuration
    pub database_retry_config: DatabaseRetryConfig,
    /// Concurrent store calls allowed for multi-object operations
    pub workers: usize,
}

/// Storage backend type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    Filesystem,
    Database,
    Memory,
}

fn invalid_input(msg: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, msg)
}

impl ServerConfig {
    pub fn load() -> Result<Self, std::io::Error> {
        Self::load_from(std::env::args_os())
    }

    pub fn load_from<I, T>(args: I) -> Result<Self, std::io::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Command::new("server")
            .arg(
                Arg::new("storage")
                    .long("storage")
                    .value_name("TYPE")
                    .help("Storage backend type: 'fs' for filesystem, 'db' for database or 'memory'")
                    .default_value(STORAGE_TYPE_FILESYSTEM),
            )
            .arg(
                Arg::new("data-dir")
                    .long("data-dir")
                    .value_name("DIR")
                    .help("Data directory for filesystem storage")
                    .default_value(DEFAULT_DATA_DIR),
            )
            .arg(
                Arg::new("database-url")
                    .long("database-url")
                    .value_name("URL")
                    .help("Database URL for database storage (can also use DATABASE_URL env var)"),
            )
            .arg(
                Arg::new("port")
                    .long("port")
                    .value_name("PORT")
                    .help("Server port (default: 8080, or SERVER_PORT env var)"),
            )
            .arg(
                Arg::new("host")
                    .long("host")
                    .value_name("HOST")
                    .help("Server host (default: 0.0.0.0, or SERVER_HOST env var)"),
            )
            .arg(
                Arg::new("workers")
                    .long("workers")
                    .value_name("N")
                    .help("Concurrent store calls for bulk operations (default: 8, or STORAGE_WORKERS env var)"),
            )
            .try_get_matches_from(args)
            .map_err(|e| invalid_input(e.to_string()))?;

        // Determine storage type
        let storage_type_str = matches
            .get_one::<String>("storage")
            .map(|s| s.as_str())
            .unwrap_or(STORAGE_TYPE_FILESYSTEM);
        let storage_type = match storage_type_str {
            STORAGE_TYPE_DATABASE => StorageType::Database,
            STORAGE_TYPE_FILESYSTEM => StorageType::Filesystem,
            STORAGE_TYPE_MEMORY => StorageType::Memory,
            _ => {
                return Err(invalid_input(format!(
                    "Invalid storage type: {}. Must be '{}', '{}' or '{}'",
                    storage_type_str,
                    STORAGE_TYPE_FILESYSTEM,
                    STORAGE_TYPE_DATABASE,
                    STORAGE_TYPE_MEMORY
                )));
            }
        };

        let data_dir = PathBuf::from(
            matches
                .get_one::<String>("data-dir")
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_DATA_DIR),
        );

        let database_url = if storage_type == StorageType::Database {
            Some(
                matches
                    .get_one::<String>("database-url")
                    .cloned()
                    .or_else(|| std::env::var("DATABASE_URL").ok())
                    .ok_or_else(|| {
                        error!("Database URL required when using database storage. Set --database-url or DATABASE_URL env var");
                        invalid_input(
                            "Database URL required when using database storage. Set --database-url or DATABASE_URL env var".to_string(),
                        )
                    })?,
            )
        } else {
            None
        };

        let env_host = std::env::var("SERVER_HOST").ok();
        let env_port = std::env::var("SERVER_PORT").ok();
        let env_workers = std::env::var("STORAGE_WORKERS").ok();

        let host = matches
            .get_one::<String>("host")
            .map(|s| s.as_str())
            .or(env_host.as_deref())
            .unwrap_or(DEFAULT_HOST)
            .to_string();

        let port_str = matches
            .get_one::<String>("port")
            .map(|s| s.as_str())
            .or(env_port.as_deref())
            .unwrap_or(DEFAULT_PORT);

        let port = port_str
            .parse()
            .map_err(|_| invalid_input(format!("Invalid port number: {}", port_str)))?;

        let workers = match matches
            .get_one::<String>("workers")
            .map(|s| s.as_str())
            .or(env_workers.as_deref())
        {
            None => drive::DEFAULT_WORKERS,
            Some(value) => match value.parse::<usize>() {
                Ok(workers) if workers > 0 => workers,
                _ => {
                    return Err(invalid_input(format!(
                        "Invalid worker count: {}. Must be a positive integer",
                        value
                    )))
                }
            },
        };

        Ok(ServerConfig {
            storage_type,
            host,
            port,
            data_dir,
            database_url,
            database_retry_config: DatabaseRetryConfig::from_env(),
            workers,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Backend selected by this configuration
    pub fn storage_backend(&self) -> Result<StorageBackend, std::io::Error> {
        match self.storage_type {
            StorageType::Memory => Ok(StorageBackend::Memory),
            StorageType::Filesystem => Ok(StorageBackend::Filesystem(self.data_dir.clone())),
            StorageType::Database => {
                let database_url = self
                    .database_url
                    .clone()
                    .ok_or_else(|| invalid_input("Database URL is not configured".to_string()))?;
                Ok(StorageBackend::Database {
                    database_url,
                    retry_config: Some(self.database_retry_config.clone()),
                })
            }
        }
    }
}
