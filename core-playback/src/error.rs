//! # Playback Error Types
//!
//! Errors surfaced by the playback backends and the coordinator. Most of
//! them never reach callers: the coordinator logs them and degrades to
//! "skip this track" or "no enrichment".

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Capability Errors
    // ========================================================================
    /// A backend cannot accept commands right now (streaming session not
    /// ready, no preview output installed).
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Neither backend can play the track.
    #[error("No playable source for track {0}")]
    NoPlayableSource(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The host refused or failed a transport command.
    #[error("Transport command failed: {0}")]
    TransportFailed(String),

    /// The streaming session lost its authorization.
    #[error("Streaming session not authorized: {0}")]
    Unauthorized(String),

    // ========================================================================
    // Control Errors
    // ========================================================================
    /// Invalid volume value (must be a finite number).
    #[error("Invalid volume: {0} (must be a finite number)")]
    InvalidVolume(f32),

    /// Failed to persist a playback preference.
    #[error("Settings error: {0}")]
    Settings(String),

    /// The coordinator was created outside a Tokio runtime.
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(BridgeError),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Unauthorized(msg) => PlaybackError::Unauthorized(msg),
            BridgeError::NotAvailable(msg) => PlaybackError::CapabilityUnavailable(msg),
            BridgeError::Rejected(msg) => PlaybackError::TransportFailed(msg),
            other => PlaybackError::Bridge(other),
        }
    }
}

impl PlaybackError {
    /// Returns `true` if a later attempt may succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::TransportFailed(_)
                | PlaybackError::Bridge(BridgeError::OperationFailed(_))
                | PlaybackError::Bridge(BridgeError::Io(_))
        )
    }

    /// Returns `true` when the failure means a backend is not usable at all.
    pub fn is_capability_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::CapabilityUnavailable(_) | PlaybackError::NoPlayableSource(_)
        )
    }

    /// Returns `true` if the streaming session needs re-authorization.
    pub fn is_authorization(&self) -> bool {
        matches!(self, PlaybackError::Unauthorized(_))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_errors_are_classified() {
        let err: PlaybackError = BridgeError::Unauthorized("token expired".into()).into();
        assert!(err.is_authorization());

        let err: PlaybackError = BridgeError::NotAvailable("no device".into()).into();
        assert!(err.is_capability_error());

        let err: PlaybackError = BridgeError::OperationFailed("timeout".into()).into();
        assert!(err.is_transient());

        let err: PlaybackError = BridgeError::Rejected("autoplay blocked".into()).into();
        assert!(matches!(err, PlaybackError::TransportFailed(_)));
    }
}
