//! # Volume Controller
//!
//! A single normalized volume shared by both backends and persisted
//! through the host's [`SettingsStore`].

use crate::error::{PlaybackError, Result};
use bridge_traits::storage::SettingsStore;
use core_runtime::config::VOLUME_SETTINGS_KEY;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

pub struct VolumeController {
    store: Arc<dyn SettingsStore>,
    tx: watch::Sender<f32>,
}

impl VolumeController {
    /// Read the persisted volume once at startup.
    ///
    /// Missing, unreadable or out-of-range values fall back to `default`.
    pub async fn load(store: Arc<dyn SettingsStore>, default: f32) -> Self {
        let default = sanitize(default).unwrap_or(1.0);
        let volume = match store.get_f64(VOLUME_SETTINGS_KEY).await {
            Ok(Some(stored)) => sanitize(stored as f32).unwrap_or_else(|| {
                warn!(stored, "Ignoring invalid persisted volume");
                default
            }),
            Ok(None) => default,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted volume");
                default
            }
        };

        debug!(volume, "Loaded volume preference");
        let (tx, _) = watch::channel(volume);
        Self { store, tx }
    }

    pub fn get(&self) -> f32 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.tx.subscribe()
    }

    /// Clamp, publish and persist `volume`, returning the applied value.
    ///
    /// A persistence failure is logged; the new volume still applies for
    /// this session.
    pub async fn set(&self, volume: f32) -> Result<f32> {
        if !volume.is_finite() {
            return Err(PlaybackError::InvalidVolume(volume));
        }
        let volume = volume.clamp(0.0, 1.0);

        self.tx.send_replace(volume);

        if let Err(e) = self.store.set_f64(VOLUME_SETTINGS_KEY, f64::from(volume)).await {
            warn!(error = %e, volume, "Failed to persist volume");
        }

        Ok(volume)
    }
}

fn sanitize(volume: f32) -> Option<f32> {
    (volume.is_finite() && (0.0..=1.0).contains(&volume)).then_some(volume)
}
