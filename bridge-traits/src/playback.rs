//! Playback bridge traits.
//!
//! Two independently clocked engines sit behind these traits:
//!
//! - [`AudioOutput`]: a single reusable media handle for short preview clips
//!   (an `<audio>` element on the web, a native player on desktop/mobile). It
//!   reports progress continuously through [`OutputEvent`]s.
//! - [`StreamingSession`]: an authorized remote playback session provided by a
//!   third-party streaming SDK. It pushes [`StreamingSnapshot`]s on its own
//!   cadence.
//!
//! Hosts own the concrete handles; the core only drives them through these
//! traits and listens to their event streams.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

/// Events emitted by an [`AudioOutput`].
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Container metadata was parsed; the duration is now known.
    DurationKnown { duration: Duration },
    /// Continuous progress report (timeupdate equivalent).
    TimeUpdate { position: Duration },
    /// Output started producing sound.
    Playing,
    /// Output paused, either on request or by the platform.
    Paused,
    /// The loaded media reached its end.
    Ended,
    /// Decode or network failure for the loaded media.
    Error { message: String },
}

/// Single persistent audio handle used for preview clips.
///
/// `set_source` must not start playback by itself. Failures that happen while
/// buffering or decoding are reported asynchronously as
/// [`OutputEvent::Error`]; the `Result` of each call only covers the command
/// being refused (for example an autoplay policy denial on `play`).
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Replace the media source.
    async fn set_source(&self, url: &str) -> Result<()>;

    /// Drop the current source so nothing can resume by accident.
    async fn clear_source(&self) -> Result<()>;

    /// Begin or resume playback of the loaded source.
    async fn play(&self) -> Result<()>;

    /// Pause playback, keeping the position.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position within the loaded source.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Volume is normalized to `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Subscribe to progress and lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<OutputEvent>;
}

/// State pushed by a [`StreamingSession`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamingSnapshot {
    pub paused: bool,
    pub position: Duration,
    pub duration: Duration,
    /// URI of the item the session is currently on, when reported.
    pub track_uri: Option<String>,
}

/// Readiness of the streaming session, as published by the host's
/// authorization/SDK wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamingStatus {
    /// An authorized account is connected.
    pub connected: bool,
    /// The SDK session is live and has a playback device.
    pub ready: bool,
}

impl StreamingStatus {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn ready() -> Self {
        Self {
            connected: true,
            ready: true,
        }
    }

    /// Streaming is usable only when both flags are set.
    pub fn is_ready(&self) -> bool {
        self.connected && self.ready
    }
}

/// Remote full-track playback session.
///
/// Transport calls made while [`is_ready`](StreamingSession::is_ready) is
/// false are a contract violation; the core never issues them.
#[async_trait]
pub trait StreamingSession: Send + Sync {
    /// Whether the session can accept transport commands right now.
    fn is_ready(&self) -> bool;

    /// Output device owned by this session, once the SDK has registered one.
    fn device_id(&self) -> Option<String>;

    /// Move the account's playback context onto `device_id`.
    async fn transfer_playback(&self, device_id: &str) -> Result<()>;

    /// Start `uri` on `device_id`, replacing whatever was playing.
    async fn play_uri(&self, device_id: &str, uri: &str) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    async fn seek(&self, position: Duration) -> Result<()>;

    /// Volume is normalized to `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Skip using the session's own queue.
    async fn next_track(&self) -> Result<()>;

    /// Go back using the session's own queue.
    async fn previous_track(&self) -> Result<()>;

    /// Subscribe to pushed state snapshots.
    fn subscribe(&self) -> broadcast::Receiver<StreamingSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_status_requires_both_flags() {
        assert!(!StreamingStatus::disconnected().is_ready());
        assert!(StreamingStatus::ready().is_ready());
        assert!(!StreamingStatus {
            connected: true,
            ready: false
        }
        .is_ready());
        assert!(!StreamingStatus {
            connected: false,
            ready: true
        }
        .is_ready());
    }

    #[test]
    fn snapshot_default_is_empty() {
        let snapshot = StreamingSnapshot::default();
        assert!(!snapshot.paused);
        assert_eq!(snapshot.position, Duration::ZERO);
        assert!(snapshot.track_uri.is_none());
    }
}
