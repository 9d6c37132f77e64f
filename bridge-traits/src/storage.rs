//! Preference storage.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value store for preferences that outlive the app session.
///
/// The playback core keeps a single key in it (`playback.volume`). Desktop
/// hosts use the SQLite store from `bridge-desktop`; mobile and web hosts
/// back it with UserDefaults/DataStore or `localStorage`.
///
/// Reading a key written with a different type is a
/// [`StorageError`](crate::error::BridgeError::StorageError), not `None`.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    async fn get_f64(&self, key: &str) -> Result<Option<f64>>;

    /// Non-finite values are rejected.
    async fn set_f64(&self, key: &str, value: f64) -> Result<()>;

    /// Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
