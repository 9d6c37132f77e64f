//! # Playback Coordinator
//!
//! Owns the play queue and arbitrates between the preview output and the
//! streaming session while publishing one [`PlaybackState`].
//!
//! ## Overview
//!
//! Per track the coordinator walks through
//! `Idle → Resolving → BackendSelected → Playing ⇄ Paused → Ended | Skipped`:
//!
//! 1. The index and `current_track` are installed eagerly.
//! 2. Under-specified tracks are enriched by the [`SourceResolver`] and the
//!    enriched copy is written back into the queue slot.
//! 3. A backend is chosen: streaming when the session is ready and the
//!    track has a streaming reference, otherwise the preview output when
//!    the track has a clip URL. Streaming wins ties.
//! 4. The other backend is stopped and the chosen one started.
//! 5. Neither backend can play the track: it is marked skipped and the
//!    queue advances once after the configured skip delay.
//!
//! ## Concurrency
//!
//! Every operation that changes what should be playing bumps a generation
//! counter. Asynchronous work re-checks it after each suspension point and
//! discards its effects when a newer intent exists; a stale start that
//! already produced audio is stopped again. Backend commands are serialized
//! through a transport lock taken only after resolution, so a slow search
//! never blocks a newer request.
//!
//! A single pump task folds preview events and streaming snapshots into
//! the state. Updates from the backend that is not the current `source`
//! are ignored.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = PlaybackCoordinator::new(deps)?;
//! let mut state = coordinator.subscribe();
//!
//! coordinator.set_queue_and_play(tracks, 0);
//! state.changed().await?;
//! coordinator.seek(30_000).await;
//! ```

use crate::error::{PlaybackError, Result};
use crate::preview::{PreviewBackend, PreviewUpdate};
use crate::resolver::SourceResolver;
use crate::state::{PlaybackSource, PlaybackState, TrackPhase};
use crate::status::StatusBridge;
use crate::streaming::StreamingBackend;
use crate::track::Track;
use crate::volume::VolumeController;
use bridge_traits::playback::{AudioOutput, OutputEvent, StreamingSession, StreamingSnapshot};
use bridge_traits::search::TrackSearch;
use core_runtime::config::PlaybackTuning;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, SessionEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Collaborators handed to [`PlaybackCoordinator::new`].
///
/// Absent backends are simply never selected.
pub struct CoordinatorDeps {
    pub output: Option<Arc<dyn AudioOutput>>,
    pub session: Option<Arc<dyn StreamingSession>>,
    pub search: Option<Arc<dyn TrackSearch>>,
    pub status: StatusBridge,
    pub volume: Arc<VolumeController>,
    pub events: EventBus,
    pub tuning: PlaybackTuning,
}

/// Cloneable handle onto the coordinator.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    preview: PreviewBackend,
    streaming: StreamingBackend,
    resolver: SourceResolver,
    status: StatusBridge,
    volume: Arc<VolumeController>,
    events: EventBus,
    tuning: PlaybackTuning,
    state: watch::Sender<PlaybackState>,
    generation: AtomicU64,
    transport: tokio::sync::Mutex<()>,
    runtime: Handle,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

impl PlaybackCoordinator {
    /// Create the coordinator and start its event pump.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(deps: CoordinatorDeps) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| PlaybackError::NoRuntime(e.to_string()))?;

        let CoordinatorDeps {
            output,
            session,
            search,
            status,
            volume,
            events,
            tuning,
        } = deps;

        let preview = PreviewBackend::new(output, tuning.seek_epsilon);
        let streaming = StreamingBackend::new(session, status.clone());
        let resolver = SourceResolver::new(
            search,
            tuning.streaming_uri_scheme.clone(),
            tuning.enrichment_cache_size,
        );
        let (state, _) = watch::channel(PlaybackState::default());

        let preview_rx = preview.subscribe();
        let streaming_rx = streaming.subscribe();

        let inner = Arc::new(Inner {
            preview,
            streaming,
            resolver,
            status,
            volume,
            events,
            tuning,
            state,
            generation: AtomicU64::new(0),
            transport: tokio::sync::Mutex::new(()),
            runtime,
            pump: Mutex::new(None),
        });

        let pump = inner.runtime.spawn(run_pump(
            Arc::downgrade(&inner),
            preview_rx,
            streaming_rx,
        ));
        *inner.pump.lock() = Some(pump);

        info!("Playback coordinator started");
        Ok(Self { inner })
    }

    /// Current state snapshot.
    pub fn state(&self) -> PlaybackState {
        self.inner.state.borrow().clone()
    }

    /// Watch every state change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state.subscribe()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.state.borrow().is_playing
    }

    pub fn volume(&self) -> f32 {
        self.inner.volume.get()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    /// Whether a track with a streaming reference would use the session
    /// right now.
    pub fn is_streaming_ready(&self) -> bool {
        self.inner.status.is_ready() && self.inner.streaming.is_ready()
    }

    /// Replace the queue and start playing at `start_index` (clamped).
    ///
    /// The new queue, index and `current_track` are visible as soon as this
    /// returns; stopping the old audio and starting the new track happen
    /// in the background.
    #[instrument(skip(self, tracks), fields(length = tracks.len()))]
    pub fn set_queue_and_play(&self, tracks: Vec<Track>, start_index: usize) {
        let inner = &self.inner;
        let generation = inner.bump();

        let index = (!tracks.is_empty()).then(|| start_index.min(tracks.len() - 1));
        let current = index.and_then(|i| tracks.get(i).cloned());
        let duration_ms = current.as_ref().map_or(0, duration_hint_ms);
        let length = tracks.len();

        inner.state.send_modify(|state| {
            state.queue = tracks;
            state.index = index;
            state.current_track = current;
            state.position_ms = 0;
            state.duration_ms = duration_ms;
            state.source = None;
            state.is_playing = false;
            state.phase = TrackPhase::Idle;
        });

        info!(length, start_index = ?index, "Queue replaced");
        inner.emit(PlaybackEvent::QueueReplaced {
            length,
            start_index: index,
        });

        let task = Arc::clone(inner);
        inner.runtime.spawn(async move {
            if !task.stop_all(generation).await {
                return;
            }
            if index.is_some() {
                task.play_with_generation(index, generation).await;
            }
        });
    }

    /// Play `index`, or the current index when `None`.
    #[instrument(skip(self))]
    pub async fn play(&self, index: Option<usize>) {
        let generation = self.inner.bump();
        self.inner.play_with_generation(index, generation).await;
    }

    /// Pause whatever is playing. Also cancels a track that is still being
    /// resolved.
    #[instrument(skip(self))]
    pub async fn pause(&self) {
        let generation = self.inner.bump();
        self.inner.pause_with_generation(generation).await;
    }

    /// Pause when playing; otherwise resume the active backend where it
    /// left off, or start the current track when nothing is loaded.
    #[instrument(skip(self))]
    pub async fn toggle_play_pause(&self) {
        if self.is_playing() {
            self.pause().await;
            return;
        }

        let inner = &self.inner;
        let generation = inner.bump();
        if !inner.resume(generation).await && inner.is_current(generation) {
            inner.play_with_generation(None, generation).await;
        }
    }

    /// Move to the next track. No-op on the last one.
    #[instrument(skip(self))]
    pub async fn next(&self) {
        let target = {
            let state = self.inner.state.borrow();
            match state.index {
                Some(_) if state.is_last() => None,
                Some(i) => Some(i + 1),
                None if state.has_queue() => Some(0),
                None => None,
            }
        };

        let Some(target) = target else {
            debug!("Already at the end of the queue");
            return;
        };

        let generation = self.inner.bump();
        self.inner.play_with_generation(Some(target), generation).await;
    }

    /// Move to the previous track.
    ///
    /// A preview that has played past the restart threshold is restarted
    /// instead. The first track is restarted as well.
    #[instrument(skip(self))]
    pub async fn prev(&self) {
        let (index, source, position_ms) = {
            let state = self.inner.state.borrow();
            (state.index, state.source, state.position_ms)
        };
        let Some(index) = index else {
            debug!("No track selected");
            return;
        };

        let threshold_ms = duration_ms(self.inner.tuning.restart_threshold);
        let target = if source == Some(PlaybackSource::Preview) && position_ms > threshold_ms {
            debug!(position_ms, "Restarting current preview");
            index
        } else {
            index.saturating_sub(1)
        };

        let generation = self.inner.bump();
        self.inner.play_with_generation(Some(target), generation).await;
    }

    /// Seek the active backend to `position_ms`, clamped to
    /// `[0, duration]` when the duration is known.
    #[instrument(skip(self))]
    pub async fn seek(&self, position_ms: i64) {
        let inner = &self.inner;
        let _transport = inner.transport.lock().await;

        let (source, duration) = {
            let state = inner.state.borrow();
            (state.source, state.duration_ms)
        };
        let Some(source) = source else {
            debug!("No active backend to seek");
            return;
        };

        let mut target = u64::try_from(position_ms).unwrap_or(0);
        if duration > 0 {
            target = target.min(duration);
        }

        let position = Duration::from_millis(target);
        let result = match source {
            PlaybackSource::Preview => inner.preview.seek(position).await,
            PlaybackSource::Streaming => inner.streaming.seek(position).await,
        };
        if let Err(e) = result {
            warn!(error = %e, %source, "Seek failed");
            return;
        }

        inner.state.send_modify(|state| state.position_ms = target);
        if let Some(track_id) = inner.current_track_id() {
            inner.emit(PlaybackEvent::Seeked {
                track_id,
                position_ms: target,
            });
        }
    }

    /// Set, persist and apply the volume, returning the clamped value.
    #[instrument(skip(self))]
    pub async fn set_volume(&self, volume: f32) -> Result<f32> {
        let inner = &self.inner;
        let applied = inner.volume.set(volume).await?;

        {
            let _transport = inner.transport.lock().await;
            if inner.preview.is_available() {
                if let Err(e) = inner.preview.set_volume(applied).await {
                    warn!(error = %e, "Failed to apply preview volume");
                }
            }
            if inner.streaming.is_ready() {
                if let Err(e) = inner.streaming.set_volume(applied).await {
                    warn!(error = %e, "Failed to apply streaming volume");
                }
            }
        }

        inner.emit(PlaybackEvent::VolumeChanged { volume: applied });
        Ok(applied)
    }

    /// Stop both backends and the event pump.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let generation = inner.bump();
        inner.stop_all(generation).await;
        inner.state.send_modify(|state| {
            state.is_playing = false;
            state.source = None;
            state.phase = TrackPhase::Idle;
        });
        if let Some(pump) = inner.pump.lock().take() {
            pump.abort();
        }
        info!("Playback coordinator stopped");
    }
}

impl Inner {
    fn bump(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| state.generation = generation);
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn emit(&self, event: PlaybackEvent) {
        self.events.emit(CoreEvent::Playback(event)).ok();
    }

    fn source(&self) -> Option<PlaybackSource> {
        self.state.borrow().source
    }

    fn current_track_id(&self) -> Option<String> {
        self.state.borrow().current_track_id().map(str::to_string)
    }

    /// Stop both backends unless `generation` went stale. Returns whether
    /// it was still current.
    async fn stop_all(&self, generation: u64) -> bool {
        let _transport = self.transport.lock().await;
        if !self.is_current(generation) {
            debug!(generation, "Discarding stale stop");
            return false;
        }
        self.stop_preview().await;
        self.streaming.stop().await;
        true
    }

    async fn stop_preview(&self) {
        if let Err(e) = self.preview.stop().await {
            warn!(error = %e, "Failed to stop preview output");
        }
    }

    async fn stop_backend(&self, source: PlaybackSource) {
        match source {
            PlaybackSource::Preview => self.stop_preview().await,
            PlaybackSource::Streaming => self.streaming.stop().await,
        }
    }

    fn select_backend(&self, track: &Track) -> Option<PlaybackSource> {
        if self.status.is_ready() && self.streaming.is_ready() && track.has_streaming_reference()
        {
            Some(PlaybackSource::Streaming)
        } else if track.has_preview() && self.preview.is_available() {
            Some(PlaybackSource::Preview)
        } else {
            None
        }
    }

    async fn play_with_generation(self: &Arc<Self>, index: Option<usize>, generation: u64) {
        let selected = {
            let state = self.state.borrow();
            index
                .or(state.index)
                .filter(|_| state.has_queue())
                .map(|i| i.min(state.queue.len() - 1))
                .and_then(|i| state.queue.get(i).cloned().map(|track| (i, track)))
        };
        let Some((index, track)) = selected else {
            debug!("Nothing to play");
            return;
        };

        // Checked under the state lock so a newer intent cannot interleave
        let installed = self.state.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            state.index = Some(index);
            state.current_track = Some(track.clone());
            state.position_ms = 0;
            state.duration_ms = duration_hint_ms(&track);
            state.source = None;
            state.is_playing = false;
            state.phase = TrackPhase::Resolving;
            true
        });
        if !installed {
            debug!(track_id = %track.id, "Discarding stale play request");
            return;
        }

        let track = if track.is_under_specified() {
            let resolved = self.resolver.resolve(&track).await;
            if !self.is_current(generation) {
                debug!(track_id = %track.id, "Discarding stale resolution");
                return;
            }
            self.write_back(index, &track, &resolved);
            resolved
        } else {
            track
        };

        let choice = self.select_backend(&track);

        let transport = self.transport.lock().await;
        if !self.is_current(generation) {
            debug!(track_id = %track.id, "Discarding stale play request");
            return;
        }

        let Some(source) = choice else {
            self.stop_preview().await;
            self.streaming.stop().await;
            drop(transport);
            self.schedule_skip(generation, index, &track.id, "no playable source".to_string());
            return;
        };

        self.state.send_modify(|state| {
            state.source = Some(source);
            state.phase = TrackPhase::BackendSelected;
        });
        debug!(track_id = %track.id, %source, "Backend selected");

        let result = self.start_backend(source, &track).await;

        if !self.is_current(generation) {
            if result.is_ok() {
                debug!(track_id = %track.id, %source, "Stopping stale start");
                self.stop_backend(source).await;
            }
            return;
        }

        match result {
            Ok(()) => {
                self.state.send_modify(|state| {
                    state.is_playing = true;
                    state.phase = TrackPhase::Playing;
                });
                info!(track_id = %track.id, title = %track.title, %source, "Track started");
                self.emit(PlaybackEvent::TrackStarted {
                    track_id: track.id.clone(),
                    title: track.title.clone(),
                    source: source.to_string(),
                });
            }
            Err(e) => {
                warn!(track_id = %track.id, %source, error = %e, "Backend failed to start");
                self.stop_backend(source).await;
                self.emit(PlaybackEvent::Error {
                    track_id: Some(track.id.clone()),
                    message: e.to_string(),
                    recoverable: e.is_transient(),
                });
                if source == PlaybackSource::Streaming && self.streaming.is_degraded() {
                    self.events
                        .emit(CoreEvent::Session(SessionEvent::Degraded {
                            reason: e.to_string(),
                        }))
                        .ok();
                }
                drop(transport);
                self.schedule_skip(generation, index, &track.id, e.to_string());
            }
        }
    }

    /// Store an enrichment result in the queue slot it came from.
    fn write_back(&self, index: usize, original: &Track, resolved: &Track) {
        let enriched = resolved != original;
        if enriched {
            self.state.send_modify(|state| {
                if let Some(slot) = state.queue.get_mut(index) {
                    if slot.id == resolved.id {
                        *slot = resolved.clone();
                    }
                }
                if state.index == Some(index) {
                    state.current_track = Some(resolved.clone());
                }
            });
        }
        debug!(track_id = %resolved.id, enriched, "Source resolved");
        self.emit(PlaybackEvent::SourceResolved {
            track_id: resolved.id.clone(),
            enriched,
        });
    }

    /// Stop the other backend, then start `track` on `source`.
    async fn start_backend(&self, source: PlaybackSource, track: &Track) -> Result<()> {
        match source {
            PlaybackSource::Streaming => {
                self.stop_preview().await;
                let uri = track
                    .streaming_reference(&self.tuning.streaming_uri_scheme)
                    .ok_or_else(|| PlaybackError::NoPlayableSource(track.id.clone()))?;
                self.streaming.play_uri(&uri).await?;
                if let Err(e) = self.streaming.set_volume(self.volume.get()).await {
                    warn!(error = %e, "Failed to apply streaming volume");
                }
                Ok(())
            }
            PlaybackSource::Preview => {
                self.streaming.stop().await;
                let url = track
                    .audio_url
                    .as_deref()
                    .ok_or_else(|| PlaybackError::NoPlayableSource(track.id.clone()))?;
                let reloaded = self.preview.loaded_url().as_deref() == Some(url);
                self.preview.load(url).await?;
                if reloaded {
                    self.preview.seek(Duration::ZERO).await?;
                }
                self.preview.play().await
            }
        }
    }

    /// Mark the track unplayable and advance once after the skip delay.
    fn schedule_skip(self: &Arc<Self>, generation: u64, index: usize, track_id: &str, reason: String) {
        self.state.send_modify(|state| {
            state.is_playing = false;
            state.source = None;
            state.phase = TrackPhase::Skipped;
        });
        warn!(track_id, %reason, "Skipping track");
        self.emit(PlaybackEvent::TrackSkipped {
            track_id: track_id.to_string(),
            reason,
        });

        let inner = Arc::clone(self);
        let delay = self.tuning.skip_delay;
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.advance(index, generation).await;
        });
    }

    /// Move past `from`, or finish the queue when it is the last track.
    async fn advance(self: &Arc<Self>, from: usize, generation: u64) {
        if !self.is_current(generation) {
            debug!(from, "Discarding stale advance");
            return;
        }

        let next = {
            let state = self.state.borrow();
            state
                .queue
                .get(from + 1)
                .map(|track| track.id.clone())
                .map(|id| (id.clone(), state.current_track_id() != Some(id.as_str())))
        };

        match next {
            None => {
                self.state.send_modify(|state| {
                    state.is_playing = false;
                    state.source = None;
                    state.phase = TrackPhase::Ended;
                });
                info!("Queue finished");
                self.emit(PlaybackEvent::QueueFinished);
            }
            Some((id, true)) => {
                debug!(from, next_id = %id, "Advancing");
                let generation = self.bump();
                self.play_with_generation(Some(from + 1), generation).await;
            }
            Some((id, false)) => {
                debug!(next_id = %id, "Next track already current");
            }
        }
    }

    async fn pause_with_generation(&self, generation: u64) {
        let _transport = self.transport.lock().await;
        if !self.is_current(generation) {
            return;
        }

        if self.preview.loaded_url().is_some() {
            if let Err(e) = self.preview.pause().await {
                warn!(error = %e, "Failed to pause preview output");
            }
        }
        if self.streaming.current_uri().is_some() && self.streaming.is_ready() {
            if let Err(e) = self.streaming.pause().await {
                warn!(error = %e, "Failed to pause streaming session");
            }
        }

        let had_source = self.source().is_some();
        self.state.send_modify(|state| {
            state.is_playing = false;
            if had_source {
                state.phase = TrackPhase::Paused;
            } else if matches!(state.phase, TrackPhase::Resolving | TrackPhase::BackendSelected) {
                state.phase = TrackPhase::Idle;
            }
        });

        if had_source {
            let (track_id, position_ms) = {
                let state = self.state.borrow();
                (state.current_track_id().map(str::to_string), state.position_ms)
            };
            if let Some(track_id) = track_id {
                self.emit(PlaybackEvent::Paused {
                    track_id,
                    position_ms,
                });
            }
        }
    }

    /// Resume the active backend. Returns `false` when nothing was resumed.
    async fn resume(&self, generation: u64) -> bool {
        let _transport = self.transport.lock().await;
        if !self.is_current(generation) {
            return true;
        }

        let result = match self.source() {
            Some(PlaybackSource::Preview) if self.preview.loaded_url().is_some() => {
                Some(self.preview.play().await)
            }
            Some(PlaybackSource::Streaming)
                if self.streaming.is_ready() && self.streaming.current_uri().is_some() =>
            {
                Some(self.streaming.resume().await)
            }
            _ => None,
        };

        match result {
            Some(Ok(())) => {
                self.state.send_modify(|state| {
                    state.is_playing = true;
                    state.phase = TrackPhase::Playing;
                });
                let (track_id, position_ms) = {
                    let state = self.state.borrow();
                    (state.current_track_id().map(str::to_string), state.position_ms)
                };
                if let Some(track_id) = track_id {
                    self.emit(PlaybackEvent::Resumed {
                        track_id,
                        position_ms,
                    });
                }
                true
            }
            Some(Err(e)) => {
                warn!(error = %e, "Resume failed, restarting track");
                false
            }
            None => false,
        }
    }

    async fn apply_initial_volume(&self) {
        if !self.preview.is_available() {
            return;
        }
        let _transport = self.transport.lock().await;
        if let Err(e) = self.preview.set_volume(self.volume.get()).await {
            warn!(error = %e, "Failed to apply initial preview volume");
        }
    }

    async fn on_preview_event(self: &Arc<Self>, event: OutputEvent) {
        let update = self.preview.observe(event).await;
        if self.source() != Some(PlaybackSource::Preview) {
            return;
        }
        let generation = self.generation.load(Ordering::SeqCst);

        match update {
            PreviewUpdate::Position(position) => {
                self.state
                    .send_modify(|state| state.position_ms = duration_ms(position));
            }
            PreviewUpdate::Duration(duration) => {
                self.state
                    .send_modify(|state| state.duration_ms = duration_ms(duration));
            }
            PreviewUpdate::Playing => {
                self.state.send_modify(|state| {
                    state.is_playing = true;
                    state.phase = TrackPhase::Playing;
                });
            }
            PreviewUpdate::Paused => {
                self.state.send_modify(|state| {
                    state.is_playing = false;
                    if state.phase == TrackPhase::Playing {
                        state.phase = TrackPhase::Paused;
                    }
                });
            }
            PreviewUpdate::Ended => self.on_track_ended(generation),
            PreviewUpdate::Failed(message) => {
                let inner = Arc::clone(self);
                self.runtime.spawn(async move {
                    inner.on_preview_failure(generation, message).await;
                });
            }
        }
    }

    fn on_streaming_snapshot(self: &Arc<Self>, snapshot: StreamingSnapshot) {
        let Some(update) = self.streaming.observe(&snapshot) else {
            return;
        };
        if self.source() != Some(PlaybackSource::Streaming) {
            return;
        }

        self.state.send_modify(|state| {
            state.position_ms = duration_ms(update.position);
            if !update.duration.is_zero() {
                state.duration_ms = duration_ms(update.duration);
            }
            state.is_playing = update.is_playing;
            state.phase = match (state.phase, update.is_playing) {
                (TrackPhase::Playing | TrackPhase::Paused, true) => TrackPhase::Playing,
                (TrackPhase::Playing | TrackPhase::Paused, false) => TrackPhase::Paused,
                (phase, _) => phase,
            };
        });

        if update.ended {
            self.on_track_ended(self.generation.load(Ordering::SeqCst));
        }
    }

    fn on_track_ended(self: &Arc<Self>, generation: u64) {
        let (index, track_id, phase) = {
            let state = self.state.borrow();
            (state.index, state.current_track_id().map(str::to_string), state.phase)
        };
        let Some(index) = index else {
            return;
        };
        if phase == TrackPhase::Ended {
            return;
        }

        self.state.send_modify(|state| {
            state.is_playing = false;
            state.phase = TrackPhase::Ended;
        });
        if let Some(track_id) = track_id {
            debug!(%track_id, "Track ended");
            self.emit(PlaybackEvent::TrackEnded { track_id });
        }

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            inner.advance(index, generation).await;
        });
    }

    async fn on_preview_failure(self: &Arc<Self>, generation: u64, message: String) {
        let transport = self.transport.lock().await;
        if !self.is_current(generation) || self.source() != Some(PlaybackSource::Preview) {
            return;
        }

        // Clearing the source can make the output report another error
        self.state.send_modify(|state| state.source = None);
        self.stop_preview().await;
        let (index, track_id) = {
            let state = self.state.borrow();
            (state.index, state.current_track_id().map(str::to_string))
        };
        drop(transport);

        let (Some(index), Some(track_id)) = (index, track_id) else {
            return;
        };
        self.emit(PlaybackEvent::Error {
            track_id: Some(track_id.clone()),
            message: message.clone(),
            recoverable: false,
        });
        self.schedule_skip(generation, index, &track_id, message);
    }
}

enum PumpMessage {
    Preview(Option<OutputEvent>),
    Streaming(Option<StreamingSnapshot>),
}

async fn run_pump(
    inner: Weak<Inner>,
    mut preview_rx: Option<broadcast::Receiver<OutputEvent>>,
    mut streaming_rx: Option<broadcast::Receiver<StreamingSnapshot>>,
) {
    if let Some(inner) = inner.upgrade() {
        inner.apply_initial_volume().await;
    }

    while preview_rx.is_some() || streaming_rx.is_some() {
        let message = tokio::select! {
            event = next_message(preview_rx.as_mut()) => PumpMessage::Preview(event),
            snapshot = next_message(streaming_rx.as_mut()) => PumpMessage::Streaming(snapshot),
        };

        let Some(inner) = inner.upgrade() else {
            break;
        };

        match message {
            PumpMessage::Preview(Some(event)) => inner.on_preview_event(event).await,
            PumpMessage::Streaming(Some(snapshot)) => inner.on_streaming_snapshot(snapshot),
            PumpMessage::Preview(None) => {
                debug!("Preview event stream closed");
                preview_rx = None;
            }
            PumpMessage::Streaming(None) => {
                debug!("Streaming snapshot stream closed");
                streaming_rx = None;
            }
        }
    }
}

/// Next value from `rx`; pending forever when there is no receiver.
async fn next_message<T: Clone>(rx: Option<&mut broadcast::Receiver<T>>) -> Option<T> {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(value) => return Some(value),
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Backend event receiver lagged");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn duration_hint_ms(track: &Track) -> u64 {
    duration_ms(track.duration_hint())
}
