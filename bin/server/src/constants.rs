/// Default data directory for filesystem storage
pub const DEFAULT_DATA_DIR: &str = "server_data";

/// Default server host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port
pub const DEFAULT_PORT: &str = "8080";

/// Storage type identifier for database
pub const STORAGE_TYPE_DATABASE: &str = "db";

/// Storage type identifier for filesystem (also used as the default storage type)
pub const STORAGE_TYPE_FILESYSTEM: &str = "fs";

/// Storage type identifier for the process-local store
pub const STORAGE_TYPE_MEMORY: &str = "memory";

/// Header carrying the user id authenticated by the upstream gateway
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Upper bound for a whole multipart upload request, in bytes
pub const MAX_UPLOAD_REQUEST_BYTES: usize = 100 * 1024 * 1024;

/// Chunks buffered between a download's producer and the response body
pub const DOWNLOAD_PIPE_CHUNKS: usize = 16;
