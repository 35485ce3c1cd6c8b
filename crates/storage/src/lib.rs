use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Ordered lists and flat string hashes, addressed by string keys.
///
/// This is the whole surface the game core needs from persistence. Every
/// method is a single round trip; the ones documented as atomic must stay so
/// under concurrent callers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Appends `values` to the tail of the list at `key`.
    async fn list_push(&self, key: &str, values: &[String]) -> Result<()>;
    /// Removes up to `count` occurrences of `value`, starting from the head.
    async fn list_remove(&self, key: &str, count: u32, value: &str) -> Result<u64>;
    async fn list_range(&self, key: &str) -> Result<Vec<String>>;
    /// Atomically swaps the list at `key` for `values`.
    async fn list_replace(&self, key: &str, values: &[String]) -> Result<()>;
    /// Sets `namespace/field` to `"1"` and writes `values` as the list at
    /// `key` in one transaction, but only when that field was absent. Returns
    /// whether this caller made the claim; a losing caller changes nothing.
    async fn list_claim(
        &self,
        key: &str,
        values: &[String],
        namespace: &str,
        field: &str,
    ) -> Result<bool>;
    /// Drops the list and the hash namespace stored under `key`.
    async fn delete(&self, key: &str) -> Result<()>;

    async fn hash_get(&self, namespace: &str, field: &str) -> Result<Option<String>>;
    async fn hash_set(&self, namespace: &str, field: &str, value: &str) -> Result<()>;
    /// Returns `true` when the field was absent and has now been written.
    async fn hash_set_if_absent(&self, namespace: &str, field: &str, value: &str) -> Result<bool>;
    /// Atomic add. Missing or non-numeric values count as zero and the stored
    /// result never drops below zero.
    async fn hash_increment(&self, namespace: &str, field: &str, delta: i64) -> Result<i64>;
    async fn hash_get_all(&self, namespace: &str) -> Result<Vec<(String, String)>>;

    async fn health_check(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // An in-memory database lives only as long as its connections, so keep
        // exactly one open for the lifetime of the pool.
        let pool_options = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl KeyValueStore for Storage {
    async fn list_push(&self, key: &str, values: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        append_list_values(&mut tx, key, values).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_remove(&self, key: &str, count: u32, value: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM kv_lists WHERE id IN (
                SELECT id FROM kv_lists WHERE list_key = ? AND value = ? ORDER BY id LIMIT ?
             )",
        )
        .bind(key)
        .bind(value)
        .bind(i64::from(count))
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to remove '{value}' from list '{key}'"))?;
        Ok(result.rows_affected())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT value FROM kv_lists WHERE list_key = ? ORDER BY id")
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to read list '{key}'"))?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
    }

    async fn list_replace(&self, key: &str, values: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM kv_lists WHERE list_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        append_list_values(&mut tx, key, values).await?;
        tx.commit()
            .await
            .with_context(|| format!("failed to replace list '{key}'"))?;
        Ok(())
    }

    async fn list_claim(
        &self,
        key: &str,
        values: &[String],
        namespace: &str,
        field: &str,
    ) -> Result<bool> {
        // The claim is the first statement so the transaction takes the write
        // lock before anything else; concurrent claimers queue behind it.
        let mut tx = self.pool.begin().await?;
        let claimed = sqlx::query(
            "INSERT INTO kv_hashes (namespace, field, value) VALUES (?, ?, '1')
             ON CONFLICT(namespace, field) DO NOTHING",
        )
        .bind(namespace)
        .bind(field)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to claim {namespace}/{field}"))?
        .rows_affected()
            == 1;
        if !claimed {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM kv_lists WHERE list_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        append_list_values(&mut tx, key, values).await?;
        tx.commit()
            .await
            .with_context(|| format!("failed to create list '{key}'"))?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM kv_lists WHERE list_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM kv_hashes WHERE namespace = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn hash_get(&self, namespace: &str, field: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_hashes WHERE namespace = ? AND field = ?")
            .bind(namespace)
            .bind(field)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read {namespace}/{field}"))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    async fn hash_set(&self, namespace: &str, field: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_hashes (namespace, field, value) VALUES (?, ?, ?)
             ON CONFLICT(namespace, field) DO UPDATE SET value = excluded.value",
        )
        .bind(namespace)
        .bind(field)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write {namespace}/{field}"))?;
        Ok(())
    }

    async fn hash_set_if_absent(&self, namespace: &str, field: &str, value: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO kv_hashes (namespace, field, value) VALUES (?, ?, ?)
             ON CONFLICT(namespace, field) DO NOTHING",
        )
        .bind(namespace)
        .bind(field)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to initialize {namespace}/{field}"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn hash_increment(&self, namespace: &str, field: &str, delta: i64) -> Result<i64> {
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO kv_hashes (namespace, field, value) VALUES (?, ?, CAST(MAX(?, 0) AS TEXT))
             ON CONFLICT(namespace, field) DO UPDATE SET value = CAST(MAX(
                 CASE
                     WHEN kv_hashes.value <> '' AND kv_hashes.value NOT GLOB '*[^0-9]*'
                         THEN CAST(kv_hashes.value AS INTEGER)
                     ELSE 0
                 END + ?,
                 0
             ) AS TEXT)
             RETURNING CAST(value AS INTEGER)",
        )
        .bind(namespace)
        .bind(field)
        .bind(delta)
        .bind(delta)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to increment {namespace}/{field}"))?;
        Ok(value)
    }

    async fn hash_get_all(&self, namespace: &str) -> Result<Vec<(String, String)>> {
        let rows =
            sqlx::query("SELECT field, value FROM kv_hashes WHERE namespace = ? ORDER BY field")
                .bind(namespace)
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("failed to read namespace '{namespace}'"))?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>(0), r.get::<String, _>(1)))
            .collect())
    }

    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

async fn append_list_values(
    tx: &mut Transaction<'_, Sqlite>,
    key: &str,
    values: &[String],
) -> Result<()> {
    for value in values {
        sqlx::query("INSERT INTO kv_lists (list_key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("failed to append to list '{key}'"))?;
    }
    Ok(())
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_in_memory(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
