//! Spotify Connect session over the Web API player endpoints.
//!
//! The session targets one Connect device (the host's Web Playback SDK
//! device, or one found with [`SpotifyConnectSession::discover_device`]).
//! Spotify does not push player state over the Web API, so a polling task
//! turns `GET /me/player` into [`StreamingSnapshot`]s.
//!
//! Readiness is published on a `watch` channel: connected once a token is
//! installed, ready once a device is known as well. A 401 from any endpoint
//! drops the session back to not-ready until the host installs a fresh
//! token.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::playback::{StreamingSession, StreamingSnapshot, StreamingStatus};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::client::SpotifyApi;
use crate::error::{ProviderError, Result};
use crate::types::{DevicesResponse, PlayRequest, PlayerState, TransferRequest};

const SNAPSHOT_BUFFER: usize = 32;

/// Default cadence of the player state poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct SpotifyConnectSession {
    api: SpotifyApi,
    device_id: RwLock<Option<String>>,
    authorized: AtomicBool,
    status: watch::Sender<StreamingStatus>,
    snapshots: broadcast::Sender<StreamingSnapshot>,
}

impl SpotifyConnectSession {
    pub fn new(api: SpotifyApi) -> Self {
        let (status, _) = watch::channel(StreamingStatus::disconnected());
        let (snapshots, _) = broadcast::channel(SNAPSHOT_BUFFER);
        let session = Self {
            api,
            device_id: RwLock::new(None),
            authorized: AtomicBool::new(true),
            status,
            snapshots,
        };
        session.publish_status();
        session
    }

    pub fn with_device(self, device_id: impl Into<String>) -> Self {
        self.set_device(Some(device_id.into()));
        self
    }

    /// Target `device_id`, typically reported by the host's SDK `ready`
    /// callback. `None` when the device went away.
    pub fn set_device(&self, device_id: Option<String>) {
        *self.device_id.write() = device_id.filter(|id| !id.is_empty());
        self.publish_status();
    }

    /// Install a fresh bearer token, clearing a previous authorization
    /// failure.
    pub fn set_access_token(&self, token: impl Into<String>) {
        self.api.token().set(token);
        self.authorized.store(true, Ordering::SeqCst);
        self.publish_status();
    }

    pub fn status(&self) -> StreamingStatus {
        *self.status.borrow()
    }

    /// Readiness changes, for forwarding into the core's status bridge.
    pub fn subscribe_status(&self) -> watch::Receiver<StreamingStatus> {
        self.status.subscribe()
    }

    fn publish_status(&self) {
        let connected = self.api.token().is_present() && self.authorized.load(Ordering::SeqCst);
        let next = StreamingStatus {
            connected,
            ready: connected && self.device_id.read().is_some(),
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                info!(connected = next.connected, ready = next.ready, "Spotify session status changed");
                *current = next;
                true
            }
        });
    }

    fn mark_unauthorized(&self) {
        warn!("Spotify session lost authorization");
        self.authorized.store(false, Ordering::SeqCst);
        self.publish_status();
    }

    fn require_device(&self) -> Result<String> {
        self.device_id.read().clone().ok_or(ProviderError::NoDevice)
    }

    async fn run(&self, request: Result<HttpRequest>, policy: RetryPolicy) -> Result<HttpResponse> {
        let result = match request {
            Ok(request) => self.api.send(request, policy).await,
            Err(e) => Err(e),
        };
        if let Err(ProviderError::AuthenticationFailed(_) | ProviderError::NoAccessToken) = &result {
            self.mark_unauthorized();
        }
        result
    }

    async fn command(&self, request: Result<HttpRequest>) -> BridgeResult<()> {
        self.run(request, RetryPolicy::no_retry()).await?;
        Ok(())
    }

    fn player_request(&self, method: HttpMethod, path: &str) -> Result<HttpRequest> {
        self.api.request(method, &format!("/me/player{}", path))
    }

    /// Pick the active device, or the first unrestricted one, from
    /// `GET /me/player/devices`.
    #[instrument(skip(self))]
    pub async fn discover_device(&self) -> BridgeResult<Option<String>> {
        let response = self
            .run(self.player_request(HttpMethod::Get, "/devices"), RetryPolicy::default())
            .await?;
        let body: DevicesResponse = response.json().map_err(|e| {
            ProviderError::ParseError(format!("Failed to parse devices response: {}", e))
        })?;

        let usable = body.devices.iter().filter(|d| !d.is_restricted && d.id.is_some());
        let chosen = usable
            .clone()
            .find(|d| d.is_active)
            .or_else(|| usable.clone().next())
            .and_then(|d| d.id.clone());

        debug!(device = ?chosen, available = body.devices.len(), "Device discovery finished");
        self.set_device(chosen.clone());
        Ok(chosen)
    }

    /// Fetch the player state once and broadcast it as a snapshot.
    ///
    /// `None` when nothing is playing on the account.
    pub async fn poll_once(&self) -> BridgeResult<Option<StreamingSnapshot>> {
        let response = self
            .run(self.player_request(HttpMethod::Get, ""), RetryPolicy::no_retry())
            .await?;
        if response.is_empty() {
            return Ok(None);
        }

        let state: PlayerState = response.json().map_err(|e| {
            ProviderError::ParseError(format!("Failed to parse player state: {}", e))
        })?;

        let item = state.item.as_ref();
        let snapshot = StreamingSnapshot {
            paused: !state.is_playing,
            position: Duration::from_millis(state.progress_ms.unwrap_or(0)),
            duration: Duration::from_millis(item.and_then(|t| t.duration_ms).unwrap_or(0)),
            track_uri: item.and_then(|t| t.uri.clone()),
        };

        self.snapshots.send(snapshot.clone()).ok();
        Ok(Some(snapshot))
    }

    /// Poll the player state every `interval` while connected. The task
    /// ends once the session is dropped.
    pub fn spawn_polling(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                if !session.status().connected {
                    continue;
                }
                if let Err(e) = session.poll_once().await {
                    debug!(error = %e, "Player state poll failed");
                }
            }
        })
    }
}

#[async_trait]
impl StreamingSession for SpotifyConnectSession {
    fn is_ready(&self) -> bool {
        self.status().is_ready()
    }

    fn device_id(&self) -> Option<String> {
        self.device_id.read().clone()
    }

    #[instrument(skip(self))]
    async fn transfer_playback(&self, device_id: &str) -> BridgeResult<()> {
        let body = TransferRequest {
            device_ids: vec![device_id.to_string()],
            play: false,
        };
        let request = self
            .player_request(HttpMethod::Put, "")
            .and_then(|r| r.json(&body).map_err(ProviderError::from));
        self.command(request).await
    }

    #[instrument(skip(self))]
    async fn play_uri(&self, device_id: &str, uri: &str) -> BridgeResult<()> {
        let body = PlayRequest {
            uris: vec![uri.to_string()],
        };
        let path = format!("/play?device_id={}", urlencoding::encode(device_id));
        let request = self
            .player_request(HttpMethod::Put, &path)
            .and_then(|r| r.json(&body).map_err(ProviderError::from));
        self.command(request).await
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.command(self.player_request(HttpMethod::Put, "/pause"))
            .await
    }

    async fn resume(&self) -> BridgeResult<()> {
        let device = self.require_device()?;
        let path = format!("/play?device_id={}", urlencoding::encode(&device));
        self.command(self.player_request(HttpMethod::Put, &path))
            .await
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        let path = format!("/seek?position_ms={}", position.as_millis());
        self.command(self.player_request(HttpMethod::Put, &path))
            .await
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        let path = format!("/volume?volume_percent={}", volume_percent(volume));
        self.command(self.player_request(HttpMethod::Put, &path))
            .await
    }

    async fn next_track(&self) -> BridgeResult<()> {
        self.command(self.player_request(HttpMethod::Post, "/next"))
            .await
    }

    async fn previous_track(&self) -> BridgeResult<()> {
        self.command(self.player_request(HttpMethod::Post, "/previous"))
            .await
    }

    fn subscribe(&self) -> broadcast::Receiver<StreamingSnapshot> {
        self.snapshots.subscribe()
    }
}

fn volume_percent(volume: f32) -> u8 {
    if !volume.is_finite() {
        return 0;
    }
    (volume.clamp(0.0, 1.0) * 100.0).round() as u8
}
