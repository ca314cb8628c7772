//! PostgreSQL object store implementation

mod queries;
mod schema;

use crate::{
    stream, ByteStream, ObjectEntry, ObjectListing, ObjectStore, StoreContext, StoreError,
    StoreResult,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use queries::Queries;
use schema::Schema;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

/// Keys fetched per listing round trip
const LIST_PAGE_SIZE: i64 = 1000;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_DELAY_SECONDS: u64 = 1;

/// Connection retry policy for database startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRetryConfig {
    pub max_attempts: u32,
    pub initial_delay_seconds: u64,
}

impl Default for DatabaseRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_seconds: DEFAULT_INITIAL_DELAY_SECONDS,
        }
    }
}

impl DatabaseRetryConfig {
    /// Read `DATABASE_MAX_RETRIES` and `DATABASE_RETRY_DELAY_SECONDS`,
    /// falling back to defaults for missing or unparsable values
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("DATABASE_MAX_RETRIES").ok().as_deref(),
            std::env::var("DATABASE_RETRY_DELAY_SECONDS").ok().as_deref(),
        )
    }

    fn from_values(max_attempts: Option<&str>, initial_delay_seconds: Option<&str>) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: max_attempts
                .and_then(|v| v.parse().ok())
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.max_attempts),
            initial_delay_seconds: initial_delay_seconds
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.initial_delay_seconds),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_secs(self.initial_delay_seconds.saturating_mul(factor))
    }
}

/// PostgreSQL object store implementation
pub struct DatabaseObjectStore {
    pool: PgPool,
}

impl DatabaseObjectStore {
    /// Connect to PostgreSQL, retrying with exponential backoff, and create the schema
    pub async fn connect(database_url: &str, retry_config: DatabaseRetryConfig) -> Result<Self> {
        let mut attempt = 1;
        let pool = loop {
            match PgPool::connect(database_url).await {
                Ok(pool) => break pool,
                Err(e) if attempt < retry_config.max_attempts => {
                    let delay = retry_config.delay_for(attempt);
                    warn!(
                        "Database connection attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, retry_config.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!(
                            "Failed to connect to PostgreSQL database after {} attempts",
                            attempt
                        )
                    })
                }
            }
        };

        Schema::initialize(&pool).await?;
        info!("Connected to PostgreSQL after {} attempt(s)", attempt);
        Ok(Self { pool })
    }
}

#[async_trait]
impl ObjectStore for DatabaseObjectStore {
    async fn stat(&self, key: &str) -> StoreResult<u64> {
        Queries::object_size(&self.pool, key)
            .await
            .store_context("Failed to query object size")?
            .map(|size| size.max(0) as u64)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn scan(&self, prefix: &str) -> ObjectListing {
        let pool = self.pool.clone();
        let prefix = prefix.to_string();

        // Keyset pagination: each page resumes after the last key seen
        futures::stream::try_unfold(Some(String::new()), move |cursor| {
            let pool = pool.clone();
            let prefix = prefix.clone();
            async move {
                let Some(after) = cursor else {
                    return Ok(None);
                };
                let page = Queries::list_page(&pool, &prefix, &after, LIST_PAGE_SIZE)
                    .await
                    .store_context("Failed to list objects")?;
                if page.is_empty() {
                    return Ok(None);
                }
                let next = if (page.len() as i64) < LIST_PAGE_SIZE {
                    None
                } else {
                    page.last().map(|entry| entry.key.clone())
                };
                let items =
                    futures::stream::iter(page.into_iter().map(Ok::<ObjectEntry, StoreError>));
                Ok::<_, StoreError>(Some((items, next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    async fn put(
        &self,
        key: &str,
        content: ByteStream,
        length: u64,
        content_type: Option<&str>,
    ) -> StoreResult<()> {
        let content = stream::collect(key, content, length).await?;
        Queries::upsert_object(&self.pool, key, &content, content_type)
            .await
            .store_context("Failed to store object")
    }

    async fn copy(&self, source: &str, destination: &str) -> StoreResult<()> {
        let copied = Queries::copy_object(&self.pool, source, destination)
            .await
            .store_context("Failed to copy object")?;
        if !copied {
            return Err(StoreError::NotFound(source.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        Queries::delete_object(&self.pool, key)
            .await
            .store_context("Failed to delete object")
    }

    async fn get_stream(&self, key: &str) -> StoreResult<ByteStream> {
        let content = Queries::read_object(&self.pool, key)
            .await
            .store_context("Failed to read object")?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(stream::from_bytes(content))
    }
}
