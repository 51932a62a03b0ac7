use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite, Transaction,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USERNAME_KEY: &str = "username";

/// Client-side key/value store with local storage semantics.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// The three session keys as persisted. A `None` field has no row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
}

impl StoredSession {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.username.is_none()
    }

    fn entries(&self) -> [(&'static str, Option<&str>); 3] {
        [
            (ACCESS_TOKEN_KEY, self.access_token.as_deref()),
            (REFRESH_TOKEN_KEY, self.refresh_token.as_deref()),
            (USERNAME_KEY, self.username.as_deref()),
        ]
    }
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = if is_memory_url(database_url) {
            // Every in-memory connection is its own database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(connect_options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(connect_options)
                .await?
        };
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM local_storage WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read local storage key '{key}'"))
    }

    pub async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write local storage key '{key}'"))?;
        Ok(())
    }

    pub async fn load_session(&self) -> Result<StoredSession> {
        Ok(StoredSession {
            access_token: self.get_item(ACCESS_TOKEN_KEY).await?,
            refresh_token: self.get_item(REFRESH_TOKEN_KEY).await?,
            username: self.get_item(USERNAME_KEY).await?,
        })
    }

    /// Replaces all three session keys in one transaction.
    pub async fn save_session(&self, session: &StoredSession) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in session.entries() {
            match value {
                Some(value) => upsert(&mut tx, key, value).await?,
                None => delete(&mut tx, key).await?,
            }
        }
        tx.commit().await.context("failed to commit session write")?;
        debug!(
            has_access_token = session.access_token.is_some(),
            "storage: session saved"
        );
        Ok(())
    }

    /// Removes all three session keys in one transaction.
    pub async fn clear_session(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USERNAME_KEY] {
            delete(&mut tx, key).await?;
        }
        tx.commit().await.context("failed to commit session clear")?;
        debug!("storage: session cleared");
        Ok(())
    }
}

async fn upsert(tx: &mut Transaction<'_, Sqlite>, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO local_storage (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value)
    .execute(&mut **tx)
    .await
    .with_context(|| format!("failed to write local storage key '{key}'"))?;
    Ok(())
}

async fn delete(tx: &mut Transaction<'_, Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM local_storage WHERE key = ?")
        .bind(key)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("failed to remove local storage key '{key}'"))?;
    Ok(())
}

fn is_memory_url(database_url: &str) -> bool {
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
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
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
