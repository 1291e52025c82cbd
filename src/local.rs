use std::{path::PathBuf, str::FromStr as _};

use tracing::{error, warn};

use crate::{
    cache::MediaCache,
    node::{FileNode, NodeStore},
};

/// SQLite database holding both the media cache and the file nodes, so a
/// command line run behaves like a host that persists state between builds.
pub struct LocalStore {
    pool: sqlx::SqlitePool,
}

pub struct SqliteCache {
    pool: sqlx::SqlitePool,
}

pub struct SqliteNodeStore {
    pool: sqlx::SqlitePool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
}

impl LocalStore {
    pub async fn open(url: &str) -> Result<Self, sqlx::Error> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)
            .inspect_err(|error| error!(%error, %url, "Failed to open local store db"))?
            .create_if_missing(true);
        let pool = sqlx::pool::PoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .inspect_err(|error| error!(%error, %url, "Failed to open local store db"))?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS media_cache(
                key TEXT NOT NULL PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS nodes(
                id TEXT NOT NULL PRIMARY KEY,
                base TEXT NOT NULL,
                path TEXT NOT NULL,
                touched_at TEXT NOT NULL
            );
        "#,
        )
        .execute(&pool)
        .await
        .inspect_err(|error| error!(%error, %url, "Failed to execute DDL to local store db"))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    pub fn cache(&self) -> SqliteCache {
        SqliteCache {
            pool: self.pool.clone(),
        }
    }

    pub fn nodes(&self) -> SqliteNodeStore {
        SqliteNodeStore {
            pool: self.pool.clone(),
        }
    }
}

impl MediaCache for SqliteCache {
    type Error = Error;

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, Self::Error> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM media_cache WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(value) = value else {
            return Ok(None);
        };
        match serde_json::from_str(&value) {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                warn!(%key, %error, "Discarding cached value that is not json");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO media_cache(key, value)
            VALUES (?, ?)
            ON CONFLICT(key)
            DO UPDATE SET
                value = EXCLUDED.value
        "#,
        )
        .bind(key)
        .bind(value.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct NodeRow {
    id: String,
    base: String,
    path: String,
}

fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

impl From<NodeRow> for FileNode {
    fn from(row: NodeRow) -> Self {
        Self {
            id: row.id,
            base: row.base,
            path: PathBuf::from(row.path),
        }
    }
}

impl NodeStore for SqliteNodeStore {
    type Error = Error;

    async fn create_node(&self, node: FileNode) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO nodes(id, base, path, touched_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET
                base = EXCLUDED.base,
                path = EXCLUDED.path,
                touched_at = EXCLUDED.touched_at
        "#,
        )
        .bind(&node.id)
        .bind(&node.base)
        .bind(node.path.display().to_string())
        .bind(timestamp(chrono::Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_node(&self, id: &str) -> Result<Option<FileNode>, Self::Error> {
        let row = sqlx::query_as::<_, NodeRow>("SELECT id, base, path FROM nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn touch_node(&self, id: &str) -> Result<(), Self::Error> {
        sqlx::query("UPDATE nodes SET touched_at = ? WHERE id = ?")
            .bind(timestamp(chrono::Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
