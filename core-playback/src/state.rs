//! Observable playback state published by the coordinator.

use crate::track::Track;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend currently driving playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackSource {
    #[serde(rename = "preview")]
    Preview,
    #[serde(rename = "spotify")]
    Streaming,
}

impl PlaybackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackSource::Preview => "preview",
            PlaybackSource::Streaming => "spotify",
        }
    }
}

impl fmt::Display for PlaybackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the current track is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackPhase {
    #[default]
    Idle,
    Resolving,
    BackendSelected,
    Playing,
    Paused,
    Ended,
    Skipped,
}

/// Snapshot of the coordinator, one writer and many readers.
///
/// `current_track` is set as soon as the index changes, ahead of any
/// backend acknowledging it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub queue: Vec<Track>,
    pub index: Option<usize>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub current_track: Option<Track>,
    pub source: Option<PlaybackSource>,
    pub is_playing: bool,
    pub phase: TrackPhase,
    /// Intent counter; bumped by every operation that changes what should
    /// be playing.
    pub generation: u64,
}

impl PlaybackState {
    pub fn has_queue(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn current_track_id(&self) -> Option<&str> {
        self.current_track.as_ref().map(|t| t.id.as_str())
    }

    pub fn is_last(&self) -> bool {
        self.index
            .is_some_and(|i| i + 1 >= self.queue.len())
    }
}
