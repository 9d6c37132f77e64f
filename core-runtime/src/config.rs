//! # Player Configuration
//!
//! Builder-based configuration for the playback core.
//!
//! ## Overview
//!
//! [`PlayerConfig`] holds the host bridges the core needs plus the
//! [`PlaybackTuning`] knobs of the coordinator. The builder validates
//! everything up front so misconfiguration fails at startup with an
//! actionable message instead of surfacing as a silent skip later.
//!
//! ## Required Dependencies
//!
//! - `SettingsStore` - persists the volume preference
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - used by catalogue search and the Web API session
//!   (desktop default: reqwest)
//!
//! When the `desktop-shims` feature is enabled, an SQLite settings store
//! under [`PlayerConfigBuilder::data_dir`] (or the platform data directory)
//! and a reqwest client are injected when not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::PlayerConfig;
//! use std::time::Duration;
//!
//! let config = PlayerConfig::builder()
//!     .settings_store(store)
//!     .skip_delay(Duration::from_millis(800))
//!     .build()
//!     .await?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Settings key under which the volume preference is persisted.
pub const VOLUME_SETTINGS_KEY: &str = "playback.volume";

/// Timing and behaviour knobs of the playback coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackTuning {
    /// Pause between marking a track unplayable and advancing past it
    pub skip_delay: Duration,
    /// `prev()` restarts the current preview instead of going back once
    /// this much of it has played
    pub restart_threshold: Duration,
    /// Preview seeks stop this far short of the end so `Ended` is not
    /// fired by the seek itself
    pub seek_epsilon: Duration,
    /// Volume used when nothing has been persisted yet
    pub default_volume: f32,
    /// Scheme used to derive streaming URIs (`<scheme>:track:<id>`)
    pub streaming_uri_scheme: String,
    /// Buffer of the event bus broadcast channel
    pub event_buffer_size: usize,
    /// Number of `(title, artist)` lookups kept by the source resolver
    pub enrichment_cache_size: usize,
}

impl Default for PlaybackTuning {
    fn default() -> Self {
        Self {
            skip_delay: Duration::from_millis(1200),
            restart_threshold: Duration::from_secs(3),
            seek_epsilon: Duration::from_millis(250),
            default_volume: 0.8,
            streaming_uri_scheme: "spotify".to_string(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            enrichment_cache_size: 512,
        }
    }
}

impl PlaybackTuning {
    pub fn validate(&self) -> Result<()> {
        if self.skip_delay > Duration::from_secs(60) {
            return Err(Error::Config(
                "Skip delay exceeds maximum of 60 seconds".to_string(),
            ));
        }

        if self.restart_threshold.is_zero() {
            return Err(Error::Config(
                "Restart threshold must be greater than 0".to_string(),
            ));
        }

        if self.seek_epsilon >= Duration::from_secs(5) {
            return Err(Error::Config(
                "Seek epsilon must be shorter than 5 seconds".to_string(),
            ));
        }

        if !self.default_volume.is_finite() || !(0.0..=1.0).contains(&self.default_volume) {
            return Err(Error::Config(format!(
                "Default volume must be within 0.0..=1.0, got {}",
                self.default_volume
            )));
        }

        if self.streaming_uri_scheme.is_empty()
            || !self
                .streaming_uri_scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(Error::Config(format!(
                "Streaming URI scheme '{}' must be non-empty and alphanumeric",
                self.streaming_uri_scheme
            )));
        }

        if self.event_buffer_size == 0 || self.event_buffer_size > 10_000 {
            return Err(Error::Config(
                "Event buffer size must be between 1 and 10,000".to_string(),
            ));
        }

        if self.enrichment_cache_size == 0 {
            return Err(Error::Config(
                "Enrichment cache size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration for the playback core.
///
/// Use [`PlayerConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct PlayerConfig {
    /// User preferences storage (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// HTTP client for catalogue and Web API calls (optional with desktop default)
    pub http_client: Option<Arc<dyn HttpClient>>,

    pub tuning: PlaybackTuning,
}

impl std::fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("settings_store", &"SettingsStore { ... }")
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field("tuning", &self.tuning)
            .finish()
    }
}

impl PlayerConfig {
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.tuning.validate()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required to persist the volume preference. \
                 Desktop: enable the 'desktop-shims' feature to use the default SqliteSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/DataStore). \
                 Web: inject a localStorage-based settings store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_settings_store(
    data_dir: Option<PathBuf>,
) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;

    let path = match data_dir {
        Some(dir) => dir.join("settings.db"),
        None => SqliteSettingsStore::default_path().ok_or_else(|| Error::CapabilityMissing {
            capability: "SettingsStore".to_string(),
            message: "No platform data directory found for the default SqliteSettingsStore. \
                     Set .data_dir() or inject a SettingsStore."
                .to_string(),
        })?,
    };

    let store = SqliteSettingsStore::open(&path).await.map_err(|e| {
        Error::Internal(format!(
            "Failed to initialize default SettingsStore at {}: {}",
            path.display(),
            e
        ))
    })?;

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_settings_store(
    _data_dir: Option<PathBuf>,
) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    let client = bridge_desktop::ReqwestHttpClient::new()?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(Some(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

/// Builder for [`PlayerConfig`].
#[derive(Default)]
pub struct PlayerConfigBuilder {
    settings_store: Option<Arc<dyn SettingsStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    data_dir: Option<PathBuf>,
    tuning: PlaybackTuning,
}

impl PlayerConfigBuilder {
    /// Inject the preferences store.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Directory for the default desktop settings database.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Replace every tuning value at once.
    pub fn tuning(mut self, tuning: PlaybackTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn skip_delay(mut self, delay: Duration) -> Self {
        self.tuning.skip_delay = delay;
        self
    }

    pub fn restart_threshold(mut self, threshold: Duration) -> Self {
        self.tuning.restart_threshold = threshold;
        self
    }

    pub fn seek_epsilon(mut self, epsilon: Duration) -> Self {
        self.tuning.seek_epsilon = epsilon;
        self
    }

    pub fn default_volume(mut self, volume: f32) -> Self {
        self.tuning.default_volume = volume;
        self
    }

    pub fn streaming_uri_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.tuning.streaming_uri_scheme = scheme.into();
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.tuning.event_buffer_size = size;
        self
    }

    pub fn enrichment_cache_size(mut self, size: usize) -> Self {
        self.tuning.enrichment_cache_size = size;
        self
    }

    /// Validate and build the configuration.
    ///
    /// Async because the desktop default settings store opens a database.
    pub async fn build(self) -> Result<PlayerConfig> {
        self.tuning.validate()?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.data_dir).await?,
        };

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client()?,
        };

        let config = PlayerConfig {
            settings_store,
            http_client,
            tuning: self.tuning,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use mockall::mock;

    mock! {
        pub Settings {}

        #[async_trait]
        impl SettingsStore for Settings {
            async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()>;
            async fn get_string(&self, key: &str) -> BridgeResult<Option<String>>;
            async fn set_f64(&self, key: &str, value: f64) -> BridgeResult<()>;
            async fn get_f64(&self, key: &str) -> BridgeResult<Option<f64>>;
            async fn delete(&self, key: &str) -> BridgeResult<()>;
        }
    }

    fn store() -> Arc<dyn SettingsStore> {
        Arc::new(MockSettings::new())
    }

    #[test]
    fn test_tuning_defaults() {
        let tuning = PlaybackTuning::default();
        assert_eq!(tuning.restart_threshold, Duration::from_secs(3));
        assert_eq!(tuning.seek_epsilon, Duration::from_millis(250));
        assert_eq!(tuning.default_volume, 0.8);
        assert_eq!(tuning.streaming_uri_scheme, "spotify");
        assert!(tuning.validate().is_ok());
    }

    #[tokio::test]
    async fn test_builder_with_injected_store() {
        let config = PlayerConfig::builder()
            .settings_store(store())
            .skip_delay(Duration::from_millis(10))
            .default_volume(0.5)
            .build()
            .await
            .unwrap();

        assert_eq!(config.tuning.skip_delay, Duration::from_millis(10));
        assert_eq!(config.tuning.default_volume, 0.5);
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[tokio::test]
    async fn test_builder_requires_settings_store() {
        let err = PlayerConfig::builder().build().await.unwrap_err();
        assert!(err.is_capability_missing());
        match err {
            Error::CapabilityMissing { capability, .. } => assert_eq!(capability, "SettingsStore"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[tokio::test]
    async fn test_build_with_desktop_defaults() {
        let dir = std::env::temp_dir().join(format!("moodplay-config-{}", std::process::id()));

        let config = PlayerConfig::builder()
            .data_dir(&dir)
            .build()
            .await
            .expect("desktop defaults should succeed");

        config.settings_store.set_f64(VOLUME_SETTINGS_KEY, 0.4).await.unwrap();
        assert_eq!(
            config.settings_store.get_f64(VOLUME_SETTINGS_KEY).await.unwrap(),
            Some(0.4)
        );
        assert!(config.http_client.is_some());

        drop(config);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_volume() {
        let result = PlayerConfig::builder()
            .settings_store(store())
            .default_volume(1.5)
            .build()
            .await;
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Default volume")));

        let result = PlayerConfig::builder()
            .settings_store(store())
            .default_volume(f32::NAN)
            .build()
            .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_rejects_bad_scheme_and_buffer() {
        let result = PlayerConfig::builder()
            .settings_store(store())
            .streaming_uri_scheme("spo tify")
            .build()
            .await;
        assert!(matches!(result, Err(Error::Config(_))));

        let result = PlayerConfig::builder()
            .settings_store(store())
            .event_buffer_size(0)
            .build()
            .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_excessive_timings() {
        let tuning = PlaybackTuning {
            skip_delay: Duration::from_secs(120),
            ..Default::default()
        };
        assert!(tuning.validate().is_err());

        let tuning = PlaybackTuning {
            restart_threshold: Duration::ZERO,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());
    }

    #[tokio::test]
    async fn test_debug_hides_bridges() {
        let config = PlayerConfig::builder()
            .settings_store(store())
            .build()
            .await
            .unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("SettingsStore { ... }"));
        assert!(rendered.contains("skip_delay"));
    }
}
