//! # Source Resolver
//!
//! Back-fills playable references for tracks that arrive with only a title
//! and artist. Resolution is infallible at the API level: any failure
//! leaves the track as it was.

use crate::track::{streaming_uri_for, Track};
use bridge_traits::search::{SearchHit, SearchQuery, TrackSearch};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

type EnrichmentKey = (String, String);

/// Resolves under-specified tracks through a [`TrackSearch`] collaborator.
///
/// Successful and empty lookups are cached by normalized `(title, artist)`
/// for the lifetime of the resolver, so a track is searched at most once
/// per session. Transport failures are not cached.
pub struct SourceResolver {
    search: Option<Arc<dyn TrackSearch>>,
    cache: Mutex<LruCache<EnrichmentKey, Option<SearchHit>>>,
    uri_scheme: String,
}

impl SourceResolver {
    pub fn new(
        search: Option<Arc<dyn TrackSearch>>,
        uri_scheme: impl Into<String>,
        cache_size: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            search,
            cache: Mutex::new(LruCache::new(capacity)),
            uri_scheme: uri_scheme.into(),
        }
    }

    /// Return an enriched copy of `track`.
    ///
    /// Playable tracks come back unchanged without a network call. Fields
    /// the track already has are never overwritten.
    pub async fn resolve(&self, track: &Track) -> Track {
        if !track.is_under_specified() {
            return track.clone();
        }

        let key = enrichment_key(track);
        if let Some(cached) = self.cache.lock().get(&key).cloned() {
            debug!(track_id = %track.id, hit = cached.is_some(), "Enrichment cache hit");
            return self.apply(track, cached.as_ref());
        }

        let Some(search) = self.search.as_ref() else {
            debug!(track_id = %track.id, "No search collaborator configured");
            return track.clone();
        };

        let artist = Some(track.artist.clone());
        let query = SearchQuery::new(track.title.clone(), artist);

        let hit = match search.search(&query).await {
            Ok(hit) => hit.filter(|hit| !hit.is_empty()),
            Err(e) => {
                warn!(track_id = %track.id, error = %e, "Track search failed");
                return track.clone();
            }
        };

        debug!(track_id = %track.id, found = hit.is_some(), "Track search finished");
        self.cache.lock().put(key, hit.clone());
        self.apply(track, hit.as_ref())
    }

    /// Number of cached lookups, including empty ones.
    pub fn cached_lookups(&self) -> usize {
        self.cache.lock().len()
    }

    fn apply(&self, track: &Track, hit: Option<&SearchHit>) -> Track {
        let mut enriched = track.clone();
        let Some(hit) = hit else {
            return enriched;
        };

        if enriched.audio_url.is_none() {
            enriched.audio_url = hit.preview_url.clone();
        }
        if enriched.cover_url.is_none() {
            enriched.cover_url = hit.cover_url.clone();
        }
        if enriched.streaming_id.is_none() {
            enriched.streaming_id = hit.streaming_id.clone();
        }
        if enriched.streaming_uri.is_none() {
            enriched.streaming_uri = enriched
                .streaming_id
                .as_deref()
                .map(|id| streaming_uri_for(&self.uri_scheme, id));
        }

        enriched
    }
}

fn enrichment_key(track: &Track) -> EnrichmentKey {
    (normalize(&track.title), normalize(&track.artist))
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;

    mock! {
        pub Search {}

        #[async_trait]
        impl TrackSearch for Search {
            async fn search(&self, query: &SearchQuery) -> BridgeResult<Option<SearchHit>>;
        }
    }

    fn full_hit() -> SearchHit {
        SearchHit {
            preview_url: Some("https://p.scdn.co/preview.mp3".into()),
            cover_url: Some("https://i.scdn.co/cover.jpg".into()),
            streaming_id: Some("4uLU6hMCjMI75M1A2tKUQC".into()),
        }
    }

    fn resolver(search: MockSearch) -> SourceResolver {
        SourceResolver::new(Some(Arc::new(search)), "spotify", 16)
    }

    #[tokio::test]
    async fn test_playable_track_is_not_searched() {
        let mut search = MockSearch::new();
        search.expect_search().never();

        let track = Track::new("1", "Holocene", "Bon Iver").with_audio_url("https://p");
        let resolved = resolver(search).resolve(&track).await;
        assert_eq!(resolved, track);
    }

    #[tokio::test]
    async fn test_enrichment_back_fills_and_derives_uri() {
        let mut search = MockSearch::new();
        search
            .expect_search()
            .withf(|q| q.title == "Holocene" && q.artist.as_deref() == Some("Bon Iver"))
            .times(1)
            .returning(|_| Ok(Some(full_hit())));

        let track = Track::new("1", "Holocene", "Bon Iver");
        let resolved = resolver(search).resolve(&track).await;

        assert_eq!(resolved.audio_url.as_deref(), Some("https://p.scdn.co/preview.mp3"));
        assert_eq!(resolved.streaming_id.as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));
        assert_eq!(
            resolved.streaming_uri.as_deref(),
            Some("spotify:track:4uLU6hMCjMI75M1A2tKUQC")
        );
        assert!(track.audio_url.is_none(), "input must not be mutated");
    }

    #[tokio::test]
    async fn test_existing_fields_are_kept() {
        let mut search = MockSearch::new();
        search.expect_search().returning(|_| Ok(Some(full_hit())));

        let track = Track::new("1", "Holocene", "Bon Iver").with_cover_url("https://mine.jpg");
        let resolved = resolver(search).resolve(&track).await;

        assert_eq!(resolved.cover_url.as_deref(), Some("https://mine.jpg"));
        assert!(resolved.audio_url.is_some());
    }

    #[tokio::test]
    async fn test_failure_returns_original() {
        let mut search = MockSearch::new();
        search
            .expect_search()
            .times(2)
            .returning(|_| Err(BridgeError::OperationFailed("HTTP 503".into())));

        let resolver = resolver(search);
        let track = Track::new("1", "Holocene", "Bon Iver");
        assert_eq!(resolver.resolve(&track).await, track);
        // Failures are retried on the next resolution
        assert_eq!(resolver.resolve(&track).await, track);
        assert_eq!(resolver.cached_lookups(), 0);
    }

    #[tokio::test]
    async fn test_lookups_cached_by_normalized_key() {
        let mut search = MockSearch::new();
        search.expect_search().times(1).returning(|_| Ok(None));

        let resolver = resolver(search);
        let a = Track::new("1", "Holocene", "Bon Iver");
        let b = Track::new("2", "  holocene ", "BON   IVER");

        assert_eq!(resolver.resolve(&a).await, a);
        assert_eq!(resolver.resolve(&b).await, b);
        assert_eq!(resolver.cached_lookups(), 1);
    }

    #[tokio::test]
    async fn test_without_search_collaborator() {
        let resolver = SourceResolver::new(None, "spotify", 4);
        let track = Track::new("1", "Holocene", "Bon Iver");
        assert_eq!(resolver.resolve(&track).await, track);
    }
}
