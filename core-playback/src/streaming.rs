//! # Streaming Backend
//!
//! Adapter over the host's [`StreamingSession`]. Every transport call is
//! gated on readiness; a failed call marks the backend degraded until the
//! status bridge publishes a fresh status.
//!
//! ## End-of-track detection
//!
//! The session pushes snapshots on its own cadence and has no explicit
//! "ended" signal. After it has been seen playing the URI we started, a
//! snapshot that is paused at position zero, or one that reports a
//! different URI, is taken as the end of that track. A pause issued
//! through this backend suspends the paused-at-zero rule until playback
//! is seen or requested again, so seeking a paused track to the start
//! does not advance the queue.

use crate::error::{PlaybackError, Result};
use crate::status::StatusBridge;
use bridge_traits::playback::{StreamingSession, StreamingSnapshot, StreamingStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Snapshot projected onto the track the coordinator started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingUpdate {
    pub position: Duration,
    pub duration: Duration,
    pub is_playing: bool,
    /// The started track finished; reported once per start.
    pub ended: bool,
}

#[derive(Debug, Default)]
struct SessionTracking {
    /// URI of the last successful `play_uri`
    current_uri: Option<String>,
    /// Whether a playing snapshot for `current_uri` has been seen
    started: bool,
    /// Paused through this backend and not resumed since
    held: bool,
    /// Device playback was last transferred to
    transferred_to: Option<String>,
}

pub struct StreamingBackend {
    session: Option<Arc<dyn StreamingSession>>,
    status: StatusBridge,
    degraded: Mutex<Option<watch::Receiver<StreamingStatus>>>,
    tracking: Mutex<SessionTracking>,
}

impl StreamingBackend {
    pub fn new(session: Option<Arc<dyn StreamingSession>>, status: StatusBridge) -> Self {
        Self {
            session,
            status,
            degraded: Mutex::new(None),
            tracking: Mutex::new(SessionTracking::default()),
        }
    }

    /// Session installed, bridge ready, SDK ready and not degraded.
    pub fn is_ready(&self) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        self.status.is_ready() && session.is_ready() && !self.is_degraded()
    }

    /// Whether a failure took the backend out of use. Cleared as soon as
    /// the status bridge publishes again.
    pub fn is_degraded(&self) -> bool {
        let mut degraded = self.degraded.lock();
        let refreshed = match degraded.as_ref() {
            None => return false,
            Some(rx) => rx.has_changed().unwrap_or(false),
        };
        if refreshed {
            info!("Streaming status refreshed, clearing degraded state");
            *degraded = None;
            return false;
        }
        true
    }

    fn mark_degraded(&self, error: &PlaybackError) {
        warn!(error = %error, "Streaming backend degraded");
        let mut rx = self.status.subscribe();
        let _ = rx.borrow_and_update();
        *self.degraded.lock() = Some(rx);
        self.tracking.lock().transferred_to = None;
    }

    fn session(&self) -> Result<&Arc<dyn StreamingSession>> {
        if !self.is_ready() {
            return Err(PlaybackError::CapabilityUnavailable(
                "streaming session not ready".to_string(),
            ));
        }
        self.session.as_ref().ok_or_else(|| {
            PlaybackError::CapabilityUnavailable("no streaming session".to_string())
        })
    }

    /// Run a session command, degrading the backend when it fails.
    async fn command<F, Fut>(&self, name: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(Arc<dyn StreamingSession>) -> Fut,
        Fut: std::future::Future<Output = bridge_traits::error::Result<()>>,
    {
        let session = Arc::clone(self.session()?);
        debug!(command = name, "Streaming command");
        f(session).await.map_err(|e| {
            let error = PlaybackError::from(e);
            self.mark_degraded(&error);
            error
        })
    }

    pub fn current_uri(&self) -> Option<String> {
        self.tracking.lock().current_uri.clone()
    }

    pub fn subscribe(&self) -> Option<broadcast::Receiver<StreamingSnapshot>> {
        self.session.as_ref().map(|session| session.subscribe())
    }

    /// Start `uri` on the session's device, transferring playback there
    /// first unless it already was.
    pub async fn play_uri(&self, uri: &str) -> Result<()> {
        let session = self.session()?;
        let device_id = session.device_id().ok_or_else(|| {
            PlaybackError::CapabilityUnavailable("streaming device not registered".to_string())
        })?;

        let needs_transfer =
            self.tracking.lock().transferred_to.as_deref() != Some(device_id.as_str());
        if needs_transfer {
            let device = device_id.clone();
            self.command("transfer_playback", |s| async move {
                s.transfer_playback(&device).await
            })
            .await?;
            self.tracking.lock().transferred_to = Some(device_id.clone());
        }

        let target = uri.to_string();
        let device = device_id.clone();
        self.command("play_uri", |s| async move { s.play_uri(&device, &target).await })
            .await?;

        let mut tracking = self.tracking.lock();
        tracking.current_uri = Some(uri.to_string());
        tracking.started = false;
        tracking.held = false;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.command("pause", |s| async move { s.pause().await })
            .await?;
        self.tracking.lock().held = true;
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        self.command("resume", |s| async move { s.resume().await })
            .await?;
        self.tracking.lock().held = false;
        Ok(())
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.command("seek", |s| async move { s.seek(position).await })
            .await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.command("set_volume", |s| async move { s.set_volume(volume).await })
            .await
    }

    /// Skip using the session's own queue.
    pub async fn next(&self) -> Result<()> {
        self.command("next_track", |s| async move { s.next_track().await })
            .await
    }

    /// Go back using the session's own queue.
    pub async fn previous(&self) -> Result<()> {
        self.command("previous_track", |s| async move { s.previous_track().await })
            .await
    }

    /// Pause whatever this backend started and forget it. Failures are
    /// logged, never returned.
    pub async fn stop(&self) {
        let had_track = self.tracking.lock().current_uri.take().is_some();
        if !had_track || !self.is_ready() {
            return;
        }
        if let Err(e) = self.pause().await {
            warn!(error = %e, "Failed to pause streaming session");
        }
    }

    /// Project a pushed snapshot onto the started track.
    ///
    /// Returns `None` when this backend has not started anything.
    pub fn observe(&self, snapshot: &StreamingSnapshot) -> Option<StreamingUpdate> {
        let mut tracking = self.tracking.lock();
        let current = tracking.current_uri.clone()?;

        let on_current = snapshot
            .track_uri
            .as_deref()
            .map_or(true, |uri| uri == current);

        if on_current && !snapshot.paused {
            tracking.started = true;
            tracking.held = false;
        }

        let rewound = on_current && snapshot.paused && snapshot.position.is_zero();
        let ended = tracking.started && ((rewound && !tracking.held) || !on_current);
        if ended {
            debug!(uri = %current, "Streaming track ended");
            tracking.started = false;
        }

        Some(StreamingUpdate {
            position: if on_current { snapshot.position } else { Duration::ZERO },
            duration: snapshot.duration,
            is_playing: on_current && !snapshot.paused,
            ended,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::status_channel;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;

    mock! {
        pub Session {}

        #[async_trait]
        impl StreamingSession for Session {
            fn is_ready(&self) -> bool;
            fn device_id(&self) -> Option<String>;
            async fn transfer_playback(&self, device_id: &str) -> BridgeResult<()>;
            async fn play_uri(&self, device_id: &str, uri: &str) -> BridgeResult<()>;
            async fn pause(&self) -> BridgeResult<()>;
            async fn resume(&self) -> BridgeResult<()>;
            async fn seek(&self, position: Duration) -> BridgeResult<()>;
            async fn set_volume(&self, volume: f32) -> BridgeResult<()>;
            async fn next_track(&self) -> BridgeResult<()>;
            async fn previous_track(&self) -> BridgeResult<()>;
            fn subscribe(&self) -> broadcast::Receiver<StreamingSnapshot>;
        }
    }

    fn ready_session() -> MockSession {
        let mut session = MockSession::new();
        session.expect_is_ready().return_const(true);
        session
            .expect_device_id()
            .return_const(Some("device-1".to_string()));
        session
    }

    fn snapshot(uri: &str, paused: bool, position_ms: u64) -> StreamingSnapshot {
        StreamingSnapshot {
            paused,
            position: Duration::from_millis(position_ms),
            duration: Duration::from_secs(200),
            track_uri: Some(uri.to_string()),
        }
    }

    #[tokio::test]
    async fn test_not_ready_never_touches_session() {
        let mut session = MockSession::new();
        session.expect_is_ready().return_const(true);
        session.expect_pause().never();

        let bridge = StatusBridge::fixed(StreamingStatus::disconnected());
        let backend = StreamingBackend::new(Some(Arc::new(session)), bridge);

        assert!(!backend.is_ready());
        assert!(backend.pause().await.unwrap_err().is_capability_error());
    }

    #[tokio::test]
    async fn test_transfers_once_per_device() {
        let mut session = ready_session();
        session
            .expect_transfer_playback()
            .withf(|device| device == "device-1")
            .times(1)
            .returning(|_| Ok(()));
        session.expect_play_uri().times(2).returning(|_, _| Ok(()));

        let backend = StreamingBackend::new(
            Some(Arc::new(session)),
            StatusBridge::fixed(StreamingStatus::ready()),
        );

        backend.play_uri("spotify:track:a").await.unwrap();
        backend.play_uri("spotify:track:b").await.unwrap();
        assert_eq!(backend.current_uri().as_deref(), Some("spotify:track:b"));
    }

    #[tokio::test]
    async fn test_failure_degrades_until_status_changes() {
        let mut session = ready_session();
        session
            .expect_pause()
            .times(1)
            .returning(|| Err(BridgeError::Unauthorized("401".into())));

        let (publisher, bridge) = status_channel(StreamingStatus::ready());
        let backend = StreamingBackend::new(Some(Arc::new(session)), bridge);

        let err = backend.pause().await.unwrap_err();
        assert!(err.is_authorization());
        assert!(!backend.is_ready());

        publisher.publish(StreamingStatus {
            connected: true,
            ready: false,
        });
        publisher.publish(StreamingStatus::ready());
        assert!(backend.is_ready());
    }

    #[tokio::test]
    async fn test_ended_after_playing_then_paused_at_zero() {
        let mut session = ready_session();
        session.expect_transfer_playback().returning(|_| Ok(()));
        session.expect_play_uri().returning(|_, _| Ok(()));

        let backend = StreamingBackend::new(
            Some(Arc::new(session)),
            StatusBridge::fixed(StreamingStatus::ready()),
        );
        let uri = "spotify:track:a";

        assert!(backend.observe(&snapshot(uri, false, 0)).is_none());

        backend.play_uri(uri).await.unwrap();

        // Paused at zero before it ever played is a cold start, not an end
        let update = backend.observe(&snapshot(uri, true, 0)).unwrap();
        assert!(!update.ended);

        let update = backend.observe(&snapshot(uri, false, 1_000)).unwrap();
        assert!(update.is_playing && !update.ended);

        let update = backend.observe(&snapshot(uri, true, 0)).unwrap();
        assert!(update.ended);

        // Reported once
        let update = backend.observe(&snapshot(uri, true, 0)).unwrap();
        assert!(!update.ended);
    }

    #[tokio::test]
    async fn test_user_pause_then_rewind_is_not_an_end() {
        let mut session = ready_session();
        session.expect_transfer_playback().returning(|_| Ok(()));
        session.expect_play_uri().returning(|_, _| Ok(()));
        session.expect_pause().times(1).returning(|| Ok(()));
        session.expect_resume().times(1).returning(|| Ok(()));

        let backend = StreamingBackend::new(
            Some(Arc::new(session)),
            StatusBridge::fixed(StreamingStatus::ready()),
        );
        let uri = "spotify:track:a";
        backend.play_uri(uri).await.unwrap();
        backend.observe(&snapshot(uri, false, 40_000));

        backend.pause().await.unwrap();
        assert!(!backend.observe(&snapshot(uri, true, 40_000)).unwrap().ended);
        assert!(!backend.observe(&snapshot(uri, true, 0)).unwrap().ended);

        // Once resumed, a natural end is detected again
        backend.resume().await.unwrap();
        backend.observe(&snapshot(uri, false, 1_000));
        assert!(backend.observe(&snapshot(uri, true, 0)).unwrap().ended);
    }

    #[tokio::test]
    async fn test_ended_when_session_moves_to_other_uri() {
        let mut session = ready_session();
        session.expect_transfer_playback().returning(|_| Ok(()));
        session.expect_play_uri().returning(|_, _| Ok(()));

        let backend = StreamingBackend::new(
            Some(Arc::new(session)),
            StatusBridge::fixed(StreamingStatus::ready()),
        );
        backend.play_uri("spotify:track:a").await.unwrap();

        backend.observe(&snapshot("spotify:track:a", false, 500));
        let update = backend.observe(&snapshot("spotify:track:z", false, 0)).unwrap();
        assert!(update.ended);
        assert!(!update.is_playing);
    }

    #[tokio::test]
    async fn test_stop_pauses_only_started_track() {
        let mut session = ready_session();
        session.expect_transfer_playback().returning(|_| Ok(()));
        session.expect_play_uri().returning(|_, _| Ok(()));
        session.expect_pause().times(1).returning(|| Ok(()));

        let backend = StreamingBackend::new(
            Some(Arc::new(session)),
            StatusBridge::fixed(StreamingStatus::ready()),
        );

        backend.stop().await;
        backend.play_uri("spotify:track:a").await.unwrap();
        backend.stop().await;
        backend.stop().await;
        assert!(backend.current_uri().is_none());
    }
}
