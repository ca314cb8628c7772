use crate::ObjectEntry;
use sqlx::PgPool;

/// Query operations for database storage
pub struct Queries;

impl Queries {
    /// Size of a stored object
    pub async fn object_size(pool: &PgPool, key: &str) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT size FROM objects WHERE object_key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// Insert or overwrite object content
    pub async fn upsert_object(
        pool: &PgPool,
        key: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO objects (object_key, content, size, content_type) VALUES ($1, $2, $3, $4)
             ON CONFLICT (object_key) DO UPDATE
             SET content = EXCLUDED.content, size = EXCLUDED.size, content_type = EXCLUDED.content_type",
        )
        .bind(key)
        .bind(content)
        .bind(content.len() as i64)
        .bind(content_type)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Copy an object row under a new key; returns false if the source is absent
    pub async fn copy_object(
        pool: &PgPool,
        source: &str,
        destination: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO objects (object_key, content, size, content_type)
             SELECT $2, content, size, content_type FROM objects WHERE object_key = $1
             ON CONFLICT (object_key) DO UPDATE
             SET content = EXCLUDED.content, size = EXCLUDED.size, content_type = EXCLUDED.content_type",
        )
        .bind(source)
        .bind(destination)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an object row
    pub async fn delete_object(pool: &PgPool, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM objects WHERE object_key = $1")
            .bind(key)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Read object content
    pub async fn read_object(pool: &PgPool, key: &str) -> Result<Option<Vec<u8>>, sqlx::Error> {
        let row = sqlx::query_as::<_, (Vec<u8>,)>("SELECT content FROM objects WHERE object_key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|(content,)| content))
    }

    /// One page of keys under `prefix`, strictly after `after`, in key order.
    ///
    /// The prefix becomes a key range so the primary key index serves the scan.
    pub async fn list_page(
        pool: &PgPool,
        prefix: &str,
        after: &str,
        limit: i64,
    ) -> Result<Vec<ObjectEntry>, sqlx::Error> {
        let query = match prefix_upper_bound(prefix) {
            Some(upper) => sqlx::query_as::<_, (String, i64)>(
                "SELECT object_key, size FROM objects
                 WHERE object_key >= $1 AND object_key > $2 AND object_key < $4
                 ORDER BY object_key LIMIT $3",
            )
            .bind(prefix)
            .bind(after)
            .bind(limit)
            .bind(upper),
            None => sqlx::query_as::<_, (String, i64)>(
                "SELECT object_key, size FROM objects
                 WHERE object_key >= $1 AND object_key > $2
                 ORDER BY object_key LIMIT $3",
            )
            .bind(prefix)
            .bind(after)
            .bind(limit),
        };
        let rows = query.fetch_all(pool).await?;

        Ok(rows
            .into_iter()
            .map(|(key, size)| ObjectEntry::new(key, size.max(0) as u64))
            .collect())
    }
}

/// Smallest key above every key that starts with `prefix`, under byte
/// (`COLLATE "C"`) ordering; `None` when no such key exists
fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let mut code = last as u32 + 1;
        while code <= char::MAX as u32 {
            if let Some(next) = char::from_u32(code) {
                chars.push(next);
                return Some(chars.into_iter().collect());
            }
            code += 1;
        }
    }
    None
}
