//! # Track Model
//!
//! Value objects queued by the coordinator. A track may carry a preview
//! clip URL, a streaming reference, both, or neither; tracks with neither
//! are *under-specified* and go through the source resolver first.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where a track entered the queue from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Recommendation,
    Search,
    History,
    Library,
    Other(String),
}

/// A queued track.
///
/// `id` is unique within a queue but not globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Short preview clip playable by the local output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Full streaming URI, e.g. `spotify:track:<id>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_uri: Option<String>,
    /// Bare catalogue id; a URI is derived from it when needed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            audio_url: None,
            streaming_uri: None,
            streaming_id: None,
            cover_url: None,
            duration_sec: None,
            provenance: None,
        }
    }

    pub fn with_audio_url(mut self, url: impl Into<String>) -> Self {
        self.audio_url = Some(url.into());
        self
    }

    pub fn with_streaming_uri(mut self, uri: impl Into<String>) -> Self {
        self.streaming_uri = Some(uri.into());
        self
    }

    pub fn with_streaming_id(mut self, id: impl Into<String>) -> Self {
        self.streaming_id = Some(id.into());
        self
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    pub fn with_duration_sec(mut self, seconds: u32) -> Self {
        self.duration_sec = Some(seconds);
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn has_preview(&self) -> bool {
        self.audio_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    pub fn has_streaming_reference(&self) -> bool {
        self.streaming_uri.as_deref().is_some_and(|uri| !uri.is_empty())
            || self.streaming_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// No preview clip and no streaming reference.
    pub fn is_under_specified(&self) -> bool {
        !self.has_preview() && !self.has_streaming_reference()
    }

    /// URI handed to the streaming session, derived from `streaming_id`
    /// when the track carries no explicit URI.
    pub fn streaming_reference(&self, scheme: &str) -> Option<String> {
        match (&self.streaming_uri, &self.streaming_id) {
            (Some(uri), _) if !uri.is_empty() => Some(uri.clone()),
            (_, Some(id)) if !id.is_empty() => Some(streaming_uri_for(scheme, id)),
            _ => None,
        }
    }

    /// Duration advertised by the track metadata, zero when unknown.
    pub fn duration_hint(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_sec.unwrap_or(0)))
    }
}

/// `"<scheme>:track:<id>"`
pub fn streaming_uri_for(scheme: &str, id: &str) -> String {
    format!("{}:track:{}", scheme, id)
}
