//! # Spotify Provider
//!
//! Spotify Web API integration for the playback core:
//!
//! - [`SpotifyTrackSearch`] resolves catalogue tracks by title and artist
//!   ([`TrackSearch`](bridge_traits::search::TrackSearch)).
//! - [`SpotifyConnectSession`] drives a Connect device through the player
//!   endpoints ([`StreamingSession`](bridge_traits::playback::StreamingSession)).
//!
//! Both share one [`SpotifyApi`] and its [`AccessToken`]. Obtaining and
//! refreshing the token is the host's job; it installs each new token
//! with [`AccessToken::set`] or [`SpotifyConnectSession::set_access_token`].
//!
//! ## Example
//!
//! ```ignore
//! use provider_spotify::{AccessToken, SpotifyApi, SpotifyConnectSession, SpotifyTrackSearch};
//! use std::sync::Arc;
//!
//! let token = AccessToken::new(host_token);
//! let api = SpotifyApi::new(http_client, token);
//! let search = SpotifyTrackSearch::new(api.clone());
//! let session = Arc::new(SpotifyConnectSession::new(api).with_device(sdk_device_id));
//! let _poller = session.spawn_polling(provider_spotify::DEFAULT_POLL_INTERVAL);
//! ```

pub mod client;
pub mod error;
pub mod search;
pub mod session;
pub mod token;
pub mod types;

pub use client::SpotifyApi;
pub use error::{ProviderError, Result};
pub use search::SpotifyTrackSearch;
pub use session::{SpotifyConnectSession, DEFAULT_POLL_INTERVAL};
pub use token::AccessToken;
