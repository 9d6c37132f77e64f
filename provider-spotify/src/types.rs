//! Spotify Web API payloads
//!
//! Only the fields the provider reads are modelled; everything else in the
//! responses is ignored by serde.

use serde::{Deserialize, Serialize};

/// `GET /v1/search` response
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub tracks: Option<Paging<TrackObject>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackObject {
    pub id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub album: Option<AlbumObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumObject {
    #[serde(default)]
    pub images: Vec<ImageObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageObject {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
}

impl TrackObject {
    /// Largest album image; Spotify lists them widest first but does not
    /// promise it.
    pub fn cover_url(&self) -> Option<String> {
        self.album.as_ref().and_then(|album| {
            album
                .images
                .iter()
                .max_by_key(|image| image.width.unwrap_or(0))
                .map(|image| image.url.clone())
        })
    }
}

/// `GET /v1/me/player` response
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub device: Option<DeviceObject>,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub item: Option<TrackObject>,
}

/// `GET /v1/me/player/devices` response
#[derive(Debug, Clone, Deserialize)]
pub struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<DeviceObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceObject {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_restricted: bool,
}

/// `PUT /v1/me/player` body
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    pub device_ids: Vec<String>,
    pub play: bool,
}

/// `PUT /v1/me/player/play` body
#[derive(Debug, Clone, Serialize)]
pub struct PlayRequest {
    pub uris: Vec<String>,
}

/// Error envelope returned by every endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_parsing() {
        let json = r#"{
            "tracks": {
                "href": "https://api.spotify.com/v1/search",
                "items": [{
                    "id": "4uLU6hMCjMI75M1A2tKUQC",
                    "uri": "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
                    "name": "Holocene",
                    "preview_url": null,
                    "duration_ms": 336613,
                    "album": {"images": [
                        {"url": "https://i.scdn.co/small.jpg", "width": 64},
                        {"url": "https://i.scdn.co/large.jpg", "width": 640}
                    ]}
                }]
            }
        }"#;

        let response: SearchResponse = serde_json::from_str(json).unwrap();
        let track = &response.tracks.unwrap().items[0];
        assert_eq!(track.id.as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));
        assert!(track.preview_url.is_none());
        assert_eq!(track.cover_url().as_deref(), Some("https://i.scdn.co/large.jpg"));
    }

    #[test]
    fn test_player_state_parsing() {
        let json = r#"{
            "device": {"id": "dev1", "name": "Web Player", "is_active": true},
            "progress_ms": 42000,
            "is_playing": true,
            "item": {"id": "abc", "uri": "spotify:track:abc", "name": "x", "duration_ms": 200000}
        }"#;

        let state: PlayerState = serde_json::from_str(json).unwrap();
        assert!(state.is_playing);
        assert_eq!(state.progress_ms, Some(42_000));
        assert_eq!(state.item.unwrap().duration_ms, Some(200_000));
    }
}
