pub mod archive;
pub mod error;
pub mod executor;
pub mod service;

pub use archive::{ArchiveStreamer, ArchiveSummary};
pub use error::{ErrorKind, StorageError};
pub use executor::{BatchOutcome, FanOutExecutor, KeyOutcome};
pub use service::{Download, DownloadSummary, StorageService, UploadItem};

/// Default number of concurrent store calls per service
pub const DEFAULT_WORKERS: usize = 8;
