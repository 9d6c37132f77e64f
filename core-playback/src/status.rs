//! Streaming readiness published by the host's authorization/SDK wrapper.

use bridge_traits::playback::StreamingStatus;
use tokio::sync::watch;

/// Host-side half: publishes readiness changes.
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<StreamingStatus>,
}

impl StatusPublisher {
    /// Publish `status`; subscribers are only woken when it differs from
    /// the current value.
    pub fn publish(&self, status: StreamingStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    pub fn current(&self) -> StreamingStatus {
        *self.tx.borrow()
    }

    /// Another read-side handle onto this publisher.
    pub fn bridge(&self) -> StatusBridge {
        StatusBridge {
            rx: self.tx.subscribe(),
        }
    }
}

/// Core-side half: read-only view of the streaming status.
///
/// The coordinator reads it only when choosing a backend for a track.
#[derive(Debug, Clone)]
pub struct StatusBridge {
    rx: watch::Receiver<StreamingStatus>,
}

impl StatusBridge {
    /// Bridge pinned to `status`, for hosts without a streaming session.
    pub fn fixed(status: StreamingStatus) -> Self {
        let (_, bridge) = status_channel(status);
        bridge
    }

    pub fn current(&self) -> StreamingStatus {
        *self.rx.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_ready()
    }

    /// Receiver that observes every published change.
    pub fn subscribe(&self) -> watch::Receiver<StreamingStatus> {
        self.rx.clone()
    }
}

/// Adopt a channel owned by a session implementation that publishes its
/// own readiness.
impl From<watch::Receiver<StreamingStatus>> for StatusBridge {
    fn from(rx: watch::Receiver<StreamingStatus>) -> Self {
        Self { rx }
    }
}

/// Create a connected publisher/bridge pair.
pub fn status_channel(initial: StreamingStatus) -> (StatusPublisher, StatusBridge) {
    let (tx, rx) = watch::channel(initial);
    (StatusPublisher { tx }, StatusBridge { rx })
}
