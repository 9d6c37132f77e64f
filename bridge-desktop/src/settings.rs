//! Preference storage backed by SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::{Path, PathBuf};
use tracing::debug;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS preferences (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

/// SQLite-backed [`SettingsStore`].
///
/// Values are stored as JSON so a single column can hold every supported
/// type; reading a key with the wrong accessor is a type error rather than a
/// silent coercion.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (or create) the store at `db_path`.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(storage_error("open settings database"))?;

        let store = Self { pool };
        store.migrate().await?;

        debug!(path = ?db_path, "Opened settings store");
        Ok(store)
    }

    /// Default location under the platform data directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("moodplay").join("settings.db"))
    }

    /// In-memory store, used by tests and ephemeral sessions.
    pub async fn in_memory() -> Result<Self> {
        // One connection: every new connection to :memory: is a fresh database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_error("open in-memory settings database"))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(storage_error("create preferences table"))?;
        Ok(())
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value.to_string())
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(storage_error("write preference"))?;

        debug!(key, "Stored preference");
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("read preference"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.get(0);
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            BridgeError::StorageError(format!("Corrupt value for '{}': {}", key, e))
        })
    }

    async fn fetch_as<T>(
        &self,
        key: &str,
        expected: &str,
        convert: impl FnOnce(&Value) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.fetch(key).await? {
            Some(value) => convert(&value).map(Some).ok_or_else(|| {
                BridgeError::StorageError(format!(
                    "Type mismatch for '{}': expected {}, found {}",
                    key, expected, value
                ))
            }),
            None => Ok(None),
        }
    }
}

fn storage_error(action: &'static str) -> impl Fn(sqlx::Error) -> BridgeError {
    move |e| BridgeError::StorageError(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, Value::from(value)).await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.fetch_as(key, "string", |v| v.as_str().map(str::to_owned))
            .await
    }

    async fn set_f64(&self, key: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(BridgeError::StorageError(format!(
                "Refusing to store non-finite value for '{}'",
                key
            )));
        }
        self.put(key, Value::from(value)).await
    }

    async fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.fetch_as(key, "number", Value::as_f64).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM preferences WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_error("delete preference"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_string_and_number_values() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_string("theme", "dusk").await.unwrap();
        store.set_f64("playback.volume", 0.3).await.unwrap();

        assert_eq!(store.get_string("theme").await.unwrap().as_deref(), Some("dusk"));
        assert_eq!(store.get_f64("playback.volume").await.unwrap(), Some(0.3));
        assert_eq!(store.get_f64("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_an_error() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_string("playback.volume", "loud").await.unwrap();

        let err = store.get_f64("playback.volume").await.unwrap_err();
        assert!(err.to_string().contains("Type mismatch"));
    }

    #[tokio::test]
    async fn test_overwrite_and_delete() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_f64("b", 1.0).await.unwrap();
        store.set_f64("a", 0.5).await.unwrap();
        store.set_f64("a", 0.25).await.unwrap();

        assert_eq!(store.get_f64("a").await.unwrap(), Some(0.25));

        store.delete("a").await.unwrap();
        store.delete("never-set").await.unwrap();
        assert_eq!(store.get_f64("a").await.unwrap(), None);
        assert_eq!(store.get_f64("b").await.unwrap(), Some(1.0));
    }

    #[tokio::test]
    async fn test_non_finite_rejected() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        assert!(store.set_f64("x", f64::NAN).await.is_err());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let path = std::env::temp_dir()
            .join(format!("moodplay-settings-{}", std::process::id()))
            .join("settings.db");

        {
            let store = SqliteSettingsStore::open(&path).await.unwrap();
            store.set_f64("playback.volume", 0.3).await.unwrap();
        }

        let reopened = SqliteSettingsStore::open(&path).await.unwrap();
        assert_eq!(reopened.get_f64("playback.volume").await.unwrap(), Some(0.3));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
