//! Search collaborator used to discover playable references for tracks that
//! arrive without one (recommendations often carry only title and artist).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Query keyed by title, optionally narrowed by artist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    pub title: String,
    pub artist: Option<String>,
}

impl SearchQuery {
    pub fn new(title: impl Into<String>, artist: Option<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.filter(|a| !a.trim().is_empty()),
        }
    }

    /// Free-text form, `"title artist"`.
    pub fn to_query_string(&self) -> String {
        match &self.artist {
            Some(artist) => format!("{} {}", self.title.trim(), artist.trim()),
            None => self.title.trim().to_string(),
        }
    }
}

/// Best match returned by a [`TrackSearch`]. Every field is optional because
/// catalogues differ in what they expose.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub preview_url: Option<String>,
    pub cover_url: Option<String>,
    /// Catalogue identifier usable by the streaming session.
    pub streaming_id: Option<String>,
}

impl SearchHit {
    /// A hit that carries nothing usable is treated like no hit.
    pub fn is_empty(&self) -> bool {
        self.preview_url.is_none() && self.cover_url.is_none() && self.streaming_id.is_none()
    }
}

/// Unreliable remote search. Implementations return `Ok(None)` for an empty
/// result set and `Err` for transport or decoding failures; callers treat both
/// as "no enrichment".
#[async_trait]
pub trait TrackSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Option<SearchHit>>;
}
