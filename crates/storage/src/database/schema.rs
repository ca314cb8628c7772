use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

/// Database schema manager
pub struct Schema;

impl Schema {
    /// Initialize all database tables and indexes
    pub async fn initialize(pool: &PgPool) -> Result<()> {
        Self::create_objects_table(pool).await?;
        info!("PostgreSQL object store initialized");
        Ok(())
    }

    /// Create objects table.
    ///
    /// The "C" collation keeps key ordering byte-wise, which keyset
    /// pagination and delimiter collapsing both rely on.
    async fn create_objects_table(pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS objects (
                object_key TEXT COLLATE "C" PRIMARY KEY,
                content BYTEA NOT NULL,
                size BIGINT NOT NULL,
                content_type TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await
        .context("Failed to create objects table")?;
        Ok(())
    }
}
