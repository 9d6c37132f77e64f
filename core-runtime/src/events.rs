//! # Event Bus System
//!
//! Broadcasts discrete playback and session transitions to any number of
//! listeners using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Continuous state (position, duration, the current track) is published by
//! the playback coordinator through a `watch` channel. The event bus carries
//! the *transitions* on top of that: a queue was replaced, a track started or
//! was skipped, the streaming session became ready, and so on. UI layers use
//! it for toasts and analytics; tests use it to observe ordering.
//!
//! ```text
//! ┌──────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ Coordinator  ├────────>│           ├────────────>│ UI / hosts │
//! └──────────────┘         │ EventBus  │             └────────────┘
//! ┌──────────────┐  emit   │           │  subscribe  ┌────────────┐
//! │ PlayerService├────────>│           ├────────────>│ Analytics  │
//! └──────────────┘         └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::QueueFinished)).ok();
//! assert_eq!(
//!     rx.recv().await.unwrap(),
//!     CoreEvent::Playback(PlaybackEvent::QueueFinished)
//! );
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal; keep receiving.
//! - **`RecvError::Closed`**: every sender was dropped. Treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; publishers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback coordinator transitions
    Playback(PlaybackEvent),
    /// Streaming session readiness
    Session(SessionEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Session(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::TrackSkipped { .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::Degraded { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::TrackStarted { .. })
            | CoreEvent::Playback(PlaybackEvent::QueueReplaced { .. })
            | CoreEvent::Playback(PlaybackEvent::QueueFinished)
            | CoreEvent::Session(SessionEvent::StatusChanged { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Discrete transitions of the playback coordinator.
///
/// `source` fields carry the serialized backend name (`"preview"` or
/// `"spotify"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// The queue was replaced wholesale.
    QueueReplaced {
        length: usize,
        /// Index selected after clamping; `None` for an empty queue.
        start_index: Option<usize>,
    },
    /// Enrichment finished for a track that needed it.
    SourceResolved {
        track_id: String,
        /// Whether the search added anything playable.
        enriched: bool,
    },
    /// A backend acknowledged playback of the current track.
    TrackStarted {
        track_id: String,
        title: String,
        source: String,
    },
    Paused {
        track_id: String,
        position_ms: u64,
    },
    Resumed {
        track_id: String,
        position_ms: u64,
    },
    Seeked {
        track_id: String,
        position_ms: u64,
    },
    /// The current track played to its end.
    TrackEnded { track_id: String },
    /// No backend could play the track; the coordinator moves past it.
    TrackSkipped { track_id: String, reason: String },
    /// The last track in the queue ended or was skipped.
    QueueFinished,
    /// Volume changed; normalized to `0.0..=1.0`.
    VolumeChanged { volume: f32 },
    /// A backend reported a failure.
    Error {
        track_id: Option<String>,
        message: String,
        /// Whether a later `play()` may succeed.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::QueueReplaced { .. } => "Queue replaced",
            PlaybackEvent::SourceResolved { .. } => "Track source resolved",
            PlaybackEvent::TrackStarted { .. } => "Track started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Seeked { .. } => "Playback position changed",
            PlaybackEvent::TrackEnded { .. } => "Track ended",
            PlaybackEvent::TrackSkipped { .. } => "Track skipped",
            PlaybackEvent::QueueFinished => "Queue finished",
            PlaybackEvent::VolumeChanged { .. } => "Volume changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Session Events
// ============================================================================

/// Streaming session readiness transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// The host published a new status.
    StatusChanged { connected: bool, ready: bool },
    /// A transport or authorization failure took the session out of use
    /// until the next status change.
    Degraded { reason: String },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::StatusChanged { ready: true, .. } => "Streaming session ready",
            SessionEvent::StatusChanged { .. } => "Streaming session unavailable",
            SessionEvent::Degraded { .. } => "Streaming session degraded",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning shares the underlying channel. Each `subscribe()` yields an
/// independent receiver that sees every event emitted after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber before it lags.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event, returning how many subscribers received it.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let session_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Session(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive; `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::TrackStarted {
            track_id: id.to_string(),
            title: format!("Track {}", id),
            source: "preview".to_string(),
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_an_error() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(started("1")).is_err());
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.emit(started("1")).unwrap(), 2);
        assert_eq!(a.recv().await.unwrap(), started("1"));
        assert_eq!(b.recv().await.unwrap(), started("1"));
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Session(_)));

        let status = CoreEvent::Session(SessionEvent::StatusChanged {
            connected: true,
            ready: true,
        });
        bus.emit(started("1")).ok();
        bus.emit(status.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), status);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(started(&i.to_string())).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let error = CoreEvent::Playback(PlaybackEvent::Error {
            track_id: None,
            message: "decode failed".to_string(),
            recoverable: true,
        });
        assert_eq!(error.severity(), EventSeverity::Error);

        let skipped = CoreEvent::Playback(PlaybackEvent::TrackSkipped {
            track_id: "t".to_string(),
            reason: "no playable source".to_string(),
        });
        assert_eq!(skipped.severity(), EventSeverity::Warning);

        assert_eq!(started("1").severity(), EventSeverity::Info);

        let seeked = CoreEvent::Playback(PlaybackEvent::Seeked {
            track_id: "t".to_string(),
            position_ms: 1_000,
        });
        assert_eq!(seeked.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_description() {
        let ready = CoreEvent::Session(SessionEvent::StatusChanged {
            connected: true,
            ready: true,
        });
        assert_eq!(ready.description(), "Streaming session ready");
        assert_eq!(
            CoreEvent::Playback(PlaybackEvent::QueueFinished).description(),
            "Queue finished"
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Playback(PlaybackEvent::QueueReplaced {
            length: 3,
            start_index: Some(1),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Playback\""));
        assert!(json.contains("\"event\":\"QueueReplaced\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(64);
        let mut sub = bus.subscribe();

        let handles: Vec<_> = (0..2)
            .map(|n| {
                let bus = bus.clone();
                tokio::spawn(async move {
                    for i in 0..10 {
                        bus.emit(started(&format!("{}-{}", n, i))).ok();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let mut count = 0;
        while sub.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 20);
    }
}
