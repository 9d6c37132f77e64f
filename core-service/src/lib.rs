//! Player service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (preview output,
//! streaming session, track search, settings) into a running
//! [`PlaybackCoordinator`] and exposes the surface the UI binds to:
//! state snapshots and subscriptions, the event bus, and the imperative
//! transport operations.
//!
//! Desktop apps typically enable the `desktop-shims` feature so the config
//! builder can fall back to `bridge-desktop`'s SQLite settings store and
//! reqwest client. The `spotify` feature adds
//! [`PlayerService::start_with_spotify`], which builds search and the
//! Connect session from the configured HTTP client.
//!
//! ```ignore
//! use core_service::{PlayerDependencies, PlayerService};
//! use core_runtime::config::PlayerConfig;
//!
//! let config = PlayerConfig::builder().data_dir(app_dir).build().await?;
//! let deps = PlayerDependencies::new(status_bridge)
//!     .with_output(preview_output)
//!     .with_search(search);
//! let player = PlayerService::start(config, deps).await?;
//!
//! player.set_queue_and_play(tracks, 0);
//! let mut state = player.subscribe();
//! ```

pub mod error;

pub use error::{CoreError, Result};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};

use std::sync::Arc;

use bridge_traits::playback::{AudioOutput, StreamingSession, StreamingStatus};
use bridge_traits::search::TrackSearch;
use core_playback::{
    CoordinatorDeps, PlaybackCoordinator, PlaybackState, StatusBridge, Track, VolumeController,
};
use core_runtime::config::PlayerConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, SessionEvent};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Host capabilities the player is built from.
///
/// Every backend is optional: a host without a preview output or a
/// streaming session still gets a coordinator that skips what it cannot
/// play.
pub struct PlayerDependencies {
    pub output: Option<Arc<dyn AudioOutput>>,
    pub session: Option<Arc<dyn StreamingSession>>,
    pub search: Option<Arc<dyn TrackSearch>>,
    pub status: StatusBridge,
}

impl PlayerDependencies {
    pub fn new(status: StatusBridge) -> Self {
        Self {
            output: None,
            session: None,
            search: None,
            status,
        }
    }

    /// Preview-only host: no streaming session, status pinned to
    /// disconnected.
    pub fn preview_only(output: Arc<dyn AudioOutput>) -> Self {
        Self::new(StatusBridge::fixed(StreamingStatus::disconnected())).with_output(output)
    }

    pub fn with_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_session(mut self, session: Arc<dyn StreamingSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn TrackSearch>) -> Self {
        self.search = Some(search);
        self
    }
}

struct ServiceInner {
    coordinator: PlaybackCoordinator,
    events: EventBus,
    volume: Arc<VolumeController>,
    status: StatusBridge,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ServiceInner {
    fn abort_tasks(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct PlayerService {
    inner: Arc<ServiceInner>,
}

impl PlayerService {
    /// Build the player from a validated config and the host's bridges.
    ///
    /// Loads the persisted volume, starts the coordinator and mirrors
    /// streaming readiness onto the event bus. Must run inside a Tokio
    /// runtime.
    pub async fn start(config: PlayerConfig, deps: PlayerDependencies) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.tuning.event_buffer_size);
        let volume = Arc::new(
            VolumeController::load(config.settings_store.clone(), config.tuning.default_volume)
                .await,
        );

        let coordinator = PlaybackCoordinator::new(CoordinatorDeps {
            output: deps.output,
            session: deps.session,
            search: deps.search,
            status: deps.status.clone(),
            volume: volume.clone(),
            events: events.clone(),
            tuning: config.tuning.clone(),
        })?;

        let forwarder = spawn_status_forwarder(deps.status.subscribe(), events.clone());

        info!(volume = volume.get(), "Player service started");

        Ok(Self {
            inner: Arc::new(ServiceInner {
                coordinator,
                events,
                volume,
                status: deps.status,
                tasks: Mutex::new(vec![forwarder]),
            }),
        })
    }

    /// The underlying coordinator, for hosts that hold it directly.
    pub fn coordinator(&self) -> &PlaybackCoordinator {
        &self.inner.coordinator
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.coordinator.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.inner.coordinator.subscribe()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.coordinator.is_playing()
    }

    pub fn volume(&self) -> f32 {
        self.inner.volume.get()
    }

    pub fn subscribe_volume(&self) -> watch::Receiver<f32> {
        self.inner.volume.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    /// Event stream wrapper with filtering support.
    pub fn event_stream(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    pub fn streaming_status(&self) -> StreamingStatus {
        self.inner.status.current()
    }

    pub fn set_queue_and_play(&self, tracks: Vec<Track>, start_index: usize) {
        self.inner.coordinator.set_queue_and_play(tracks, start_index);
    }

    pub async fn play(&self, index: Option<usize>) {
        self.inner.coordinator.play(index).await;
    }

    pub async fn pause(&self) {
        self.inner.coordinator.pause().await;
    }

    pub async fn toggle_play_pause(&self) {
        self.inner.coordinator.toggle_play_pause().await;
    }

    pub async fn next(&self) {
        self.inner.coordinator.next().await;
    }

    pub async fn prev(&self) {
        self.inner.coordinator.prev().await;
    }

    pub async fn seek(&self, position_ms: i64) {
        self.inner.coordinator.seek(position_ms).await;
    }

    /// Returns the volume actually applied after clamping.
    pub async fn set_volume(&self, volume: f32) -> Result<f32> {
        Ok(self.inner.coordinator.set_volume(volume).await?)
    }

    /// Stop both backends and the background tasks.
    pub async fn shutdown(&self) {
        self.inner.coordinator.shutdown().await;
        self.inner.abort_tasks();
        info!("Player service stopped");
    }
}

#[cfg(feature = "spotify")]
impl PlayerService {
    /// Build the player on top of Spotify: catalogue search for enrichment
    /// and a Connect session for full-track playback.
    ///
    /// Streaming readiness comes from the session itself, and its player
    /// state is polled every `poll_interval` until shutdown. Requires an
    /// HTTP client in `config` (the desktop default provides one). The
    /// returned session is where the host installs the device id and
    /// refreshed tokens.
    pub async fn start_with_spotify(
        config: PlayerConfig,
        output: Option<Arc<dyn AudioOutput>>,
        token: provider_spotify::AccessToken,
        poll_interval: std::time::Duration,
    ) -> Result<(Self, Arc<provider_spotify::SpotifyConnectSession>)> {
        use provider_spotify::{SpotifyApi, SpotifyConnectSession, SpotifyTrackSearch};

        let http_client = config
            .http_client
            .clone()
            .ok_or_else(|| CoreError::CapabilityMissing {
                capability: "HttpClient".to_string(),
                message: "Spotify search and playback need an HTTP client. \
                         Enable 'desktop-shims' or set .http_client() on the config builder."
                    .to_string(),
            })?;

        let api = SpotifyApi::new(http_client, token);
        let session = Arc::new(SpotifyConnectSession::new(api.clone()));
        let search: Arc<dyn TrackSearch> = Arc::new(SpotifyTrackSearch::new(api));

        let streaming: Arc<dyn StreamingSession> = session.clone();
        let deps = PlayerDependencies {
            output,
            session: Some(streaming),
            search: Some(search),
            status: StatusBridge::from(session.subscribe_status()),
        };

        let service = Self::start(config, deps).await?;
        service
            .inner
            .tasks
            .lock()
            .push(session.spawn_polling(poll_interval));
        Ok((service, session))
    }
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Mirror every readiness change onto the bus. Ends when the publisher
/// side is dropped.
fn spawn_status_forwarder(
    mut rx: watch::Receiver<StreamingStatus>,
    events: EventBus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let status = *rx.borrow_and_update();
            info!(
                connected = status.connected,
                ready = status.ready,
                "Streaming status changed"
            );
            events
                .emit(CoreEvent::Session(SessionEvent::StatusChanged {
                    connected: status.connected,
                    ready: status.ready,
                }))
                .ok();
        }
        debug!("Streaming status publisher dropped");
    })
}
