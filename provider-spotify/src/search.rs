//! Catalogue search used to enrich tracks that only carry title and artist.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpMethod, RetryPolicy};
use bridge_traits::search::{SearchHit, SearchQuery, TrackSearch};
use tracing::{debug, instrument};

use crate::client::SpotifyApi;
use crate::error::ProviderError;
use crate::types::{SearchResponse, TrackObject};

/// `TrackSearch` over `GET /v1/search?type=track&limit=1`.
///
/// # Example
///
/// ```ignore
/// use provider_spotify::{AccessToken, SpotifyApi, SpotifyTrackSearch};
///
/// let api = SpotifyApi::new(http_client, AccessToken::new(token));
/// let search = SpotifyTrackSearch::new(api).with_market("US");
/// let hit = search.search(&SearchQuery::new("Holocene", Some("Bon Iver".into()))).await?;
/// ```
pub struct SpotifyTrackSearch {
    api: SpotifyApi,
    market: Option<String>,
}

impl SpotifyTrackSearch {
    pub fn new(api: SpotifyApi) -> Self {
        Self { api, market: None }
    }

    /// Restrict results to tracks playable in an ISO 3166-1 market.
    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = Some(market.into());
        self
    }

    fn path(&self, query: &SearchQuery) -> String {
        let mut path = format!(
            "/search?q={}&type=track&limit=1",
            urlencoding::encode(&query.to_query_string())
        );
        if let Some(market) = &self.market {
            path.push_str(&format!("&market={}", urlencoding::encode(market)));
        }
        path
    }

    fn to_hit(track: TrackObject) -> SearchHit {
        SearchHit {
            cover_url: track.cover_url(),
            preview_url: track.preview_url.filter(|url| !url.is_empty()),
            streaming_id: track.id,
        }
    }
}

#[async_trait]
impl TrackSearch for SpotifyTrackSearch {
    #[instrument(skip(self), fields(title = %query.title))]
    async fn search(&self, query: &SearchQuery) -> Result<Option<SearchHit>> {
        let request = self.api.request(HttpMethod::Get, &self.path(query))?;
        let response = self.api.send(request, RetryPolicy::default()).await?;

        let body: SearchResponse = response.json().map_err(|e| {
            ProviderError::ParseError(format!("Failed to parse search response: {}", e))
        })?;

        let hit = body
            .tracks
            .and_then(|page| page.items.into_iter().next())
            .map(Self::to_hit)
            .filter(|hit| !hit.is_empty());

        debug!(found = hit.is_some(), "Spotify search finished");
        Ok(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::AccessToken;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;
    use std::sync::Arc;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn search_with(mock: MockHttpClient) -> SpotifyTrackSearch {
        let api = SpotifyApi::new(Arc::new(mock), AccessToken::new("test_token"));
        SpotifyTrackSearch::new(api)
    }

    #[tokio::test]
    async fn test_search_returns_first_hit() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Get
                    && req.url.starts_with("https://api.spotify.com/v1/search?q=Holocene%20Bon%20Iver")
                    && req.url.contains("type=track")
                    && req.url.contains("limit=1")
                    && req.headers.get("Authorization") == Some(&"Bearer test_token".to_string())
            })
            .times(1)
            .returning(|_| {
                Ok(ok(r#"{"tracks":{"items":[{
                    "id":"4uLU6hMCjMI75M1A2tKUQC",
                    "name":"Holocene",
                    "preview_url":"https://p.scdn.co/mp3-preview/abc",
                    "album":{"images":[{"url":"https://i.scdn.co/cover.jpg","width":640}]}
                }]}}"#))
            });

        let query = SearchQuery::new("Holocene", Some("Bon Iver".to_string()));
        let hit = search_with(mock_http).search(&query).await.unwrap().unwrap();

        assert_eq!(hit.streaming_id.as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));
        assert_eq!(
            hit.preview_url.as_deref(),
            Some("https://p.scdn.co/mp3-preview/abc")
        );
        assert_eq!(hit.cover_url.as_deref(), Some("https://i.scdn.co/cover.jpg"));
    }

    #[tokio::test]
    async fn test_empty_result_is_none() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .returning(|_| Ok(ok(r#"{"tracks":{"items":[]}}"#)));

        let query = SearchQuery::new("nothing at all", None);
        assert!(search_with(mock_http).search(&query).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_market_is_appended() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|req| req.url.ends_with("&market=SE"))
            .returning(|_| Ok(ok(r#"{"tracks":{"items":[]}}"#)));

        let search = search_with(mock_http).with_market("SE");
        search.search(&SearchQuery::new("x", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().returning(|_| {
            Ok(HttpResponse {
                status: 401,
                headers: HashMap::new(),
                body: Bytes::from_static(br#"{"error":{"status":401,"message":"The access token expired"}}"#),
            })
        });

        let err = search_with(mock_http)
            .search(&SearchQuery::new("Holocene", None))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Unauthorized(ref msg) if msg.contains("expired")));
    }

    #[tokio::test]
    async fn test_missing_token_never_hits_network() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().never();

        let api = SpotifyApi::new(Arc::new(mock_http), AccessToken::default());
        let err = SpotifyTrackSearch::new(api)
            .search(&SearchQuery::new("Holocene", None))
            .await
            .unwrap_err();
        assert!(err.is_authorization());
    }

    #[tokio::test]
    async fn test_malformed_body_is_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().returning(|_| Ok(ok("<html>")));

        let err = search_with(mock_http)
            .search(&SearchQuery::new("Holocene", None))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(_)));
    }
}
