//! # Preview Backend
//!
//! Drives the single persistent [`AudioOutput`] handle used for short
//! preview clips and keeps the clip metadata (duration, last reported
//! position, a deferred seek) the coordinator needs.

use crate::error::{PlaybackError, Result};
use bridge_traits::playback::{AudioOutput, OutputEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// What an [`OutputEvent`] means for the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewUpdate {
    Position(Duration),
    Duration(Duration),
    Playing,
    Paused,
    Ended,
    Failed(String),
}

#[derive(Debug, Default)]
struct ClipState {
    loaded_url: Option<String>,
    duration: Option<Duration>,
    position: Duration,
    pending_seek: Option<Duration>,
}

pub struct PreviewBackend {
    output: Option<Arc<dyn AudioOutput>>,
    clip: Mutex<ClipState>,
    seek_epsilon: Duration,
}

impl PreviewBackend {
    pub fn new(output: Option<Arc<dyn AudioOutput>>, seek_epsilon: Duration) -> Self {
        Self {
            output,
            clip: Mutex::new(ClipState::default()),
            seek_epsilon,
        }
    }

    /// Whether the host installed an output handle.
    pub fn is_available(&self) -> bool {
        self.output.is_some()
    }

    pub fn loaded_url(&self) -> Option<String> {
        self.clip.lock().loaded_url.clone()
    }

    pub fn position(&self) -> Duration {
        self.clip.lock().position
    }

    pub fn subscribe(&self) -> Option<broadcast::Receiver<OutputEvent>> {
        self.output.as_ref().map(|output| output.subscribe())
    }

    fn output(&self) -> Result<&Arc<dyn AudioOutput>> {
        self.output
            .as_ref()
            .ok_or_else(|| PlaybackError::CapabilityUnavailable("no preview output".to_string()))
    }

    /// Point the output at `url`. The source is only swapped when it
    /// differs from the loaded one; loading never starts playback.
    pub async fn load(&self, url: &str) -> Result<()> {
        let output = self.output()?;
        if self.clip.lock().loaded_url.as_deref() == Some(url) {
            debug!(url, "Preview source already loaded");
            return Ok(());
        }

        output.set_source(url).await?;

        *self.clip.lock() = ClipState {
            loaded_url: Some(url.to_string()),
            ..ClipState::default()
        };
        Ok(())
    }

    pub async fn play(&self) -> Result<()> {
        self.output()?.play().await.map_err(|e| {
            warn!(error = %e, "Preview output refused to play");
            PlaybackError::from(e)
        })
    }

    pub async fn pause(&self) -> Result<()> {
        self.output()?.pause().await?;
        Ok(())
    }

    /// Seek within the loaded clip.
    ///
    /// Clamped to `duration - epsilon`. Before the duration is known the
    /// request is stored and applied once it arrives.
    pub async fn seek(&self, position: Duration) -> Result<()> {
        let output = self.output()?;

        let target = {
            let mut clip = self.clip.lock();
            match clip.duration {
                Some(duration) => {
                    let target = position.min(duration.saturating_sub(self.seek_epsilon));
                    clip.position = target;
                    Some(target)
                }
                None => {
                    debug!(?position, "Deferring preview seek until duration is known");
                    clip.pending_seek = Some(position);
                    None
                }
            }
        };

        if let Some(target) = target {
            output.seek(target).await?;
        }
        Ok(())
    }

    /// Pause and drop the source so nothing resumes by accident.
    pub async fn stop(&self) -> Result<()> {
        let Some(output) = self.output.as_ref() else {
            return Ok(());
        };
        let was_loaded = self.clip.lock().loaded_url.is_some();
        if !was_loaded {
            return Ok(());
        }

        output.pause().await?;
        output.clear_source().await?;
        *self.clip.lock() = ClipState::default();
        Ok(())
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.output()?.set_volume(volume).await?;
        Ok(())
    }

    /// Fold an output event into the clip metadata.
    ///
    /// A seek deferred by [`seek`](Self::seek) is applied here once the
    /// duration arrives.
    pub async fn observe(&self, event: OutputEvent) -> PreviewUpdate {
        match event {
            OutputEvent::TimeUpdate { position } => {
                self.clip.lock().position = position;
                PreviewUpdate::Position(position)
            }
            OutputEvent::DurationKnown { duration } => {
                let pending = {
                    let mut clip = self.clip.lock();
                    clip.duration = Some(duration);
                    clip.pending_seek.take()
                };
                if let Some(position) = pending {
                    if let Err(e) = self.seek(position).await {
                        warn!(error = %e, "Deferred preview seek failed");
                    }
                }
                PreviewUpdate::Duration(duration)
            }
            OutputEvent::Playing => PreviewUpdate::Playing,
            OutputEvent::Paused => PreviewUpdate::Paused,
            OutputEvent::Ended => {
                let mut clip = self.clip.lock();
                if let Some(duration) = clip.duration {
                    clip.position = duration;
                }
                PreviewUpdate::Ended
            }
            OutputEvent::Error { message } => {
                warn!(%message, "Preview output reported an error");
                PreviewUpdate::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        SetSource(String),
        Clear,
        Play,
        Pause,
        Seek(Duration),
        Volume(f32),
    }

    struct RecordingOutput {
        calls: Mutex<Vec<Call>>,
        events: broadcast::Sender<OutputEvent>,
    }

    impl RecordingOutput {
        fn new() -> Arc<Self> {
            let (events, _) = broadcast::channel(16);
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                events,
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl AudioOutput for RecordingOutput {
        async fn set_source(&self, url: &str) -> BridgeResult<()> {
            self.calls.lock().push(Call::SetSource(url.to_string()));
            Ok(())
        }
        async fn clear_source(&self) -> BridgeResult<()> {
            self.calls.lock().push(Call::Clear);
            Ok(())
        }
        async fn play(&self) -> BridgeResult<()> {
            self.calls.lock().push(Call::Play);
            Ok(())
        }
        async fn pause(&self) -> BridgeResult<()> {
            self.calls.lock().push(Call::Pause);
            Ok(())
        }
        async fn seek(&self, position: Duration) -> BridgeResult<()> {
            self.calls.lock().push(Call::Seek(position));
            Ok(())
        }
        async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
            self.calls.lock().push(Call::Volume(volume));
            Ok(())
        }
        fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
            self.events.subscribe()
        }
    }

    fn backend(output: &Arc<RecordingOutput>) -> PreviewBackend {
        let output: Arc<dyn AudioOutput> = output.clone();
        PreviewBackend::new(Some(output), Duration::from_millis(250))
    }

    #[tokio::test]
    async fn test_load_only_swaps_changed_source() {
        let output = RecordingOutput::new();
        let preview = backend(&output);

        preview.load("https://a.mp3").await.unwrap();
        preview.load("https://a.mp3").await.unwrap();
        preview.load("https://b.mp3").await.unwrap();

        assert_eq!(
            output.calls(),
            vec![
                Call::SetSource("https://a.mp3".into()),
                Call::SetSource("https://b.mp3".into())
            ]
        );
        assert_eq!(preview.loaded_url().as_deref(), Some("https://b.mp3"));
    }

    #[tokio::test]
    async fn test_seek_clamps_to_duration_minus_epsilon() {
        let output = RecordingOutput::new();
        let preview = backend(&output);
        preview.load("https://a.mp3").await.unwrap();
        preview
            .observe(OutputEvent::DurationKnown {
                duration: Duration::from_secs(30),
            })
            .await;

        preview.seek(Duration::from_secs(45)).await.unwrap();
        assert_eq!(
            output.calls().last(),
            Some(&Call::Seek(Duration::from_millis(29_750)))
        );
    }

    #[tokio::test]
    async fn test_seek_before_metadata_is_deferred() {
        let output = RecordingOutput::new();
        let preview = backend(&output);
        preview.load("https://a.mp3").await.unwrap();

        preview.seek(Duration::from_secs(10)).await.unwrap();
        assert!(!output.calls().iter().any(|c| matches!(c, Call::Seek(_))));

        let update = preview
            .observe(OutputEvent::DurationKnown {
                duration: Duration::from_secs(30),
            })
            .await;
        assert_eq!(update, PreviewUpdate::Duration(Duration::from_secs(30)));
        assert_eq!(
            output.calls().last(),
            Some(&Call::Seek(Duration::from_secs(10)))
        );
    }

    #[tokio::test]
    async fn test_stop_pauses_and_clears() {
        let output = RecordingOutput::new();
        let preview = backend(&output);

        preview.stop().await.unwrap();
        assert!(output.calls().is_empty(), "nothing loaded, nothing to stop");

        preview.load("https://a.mp3").await.unwrap();
        preview.play().await.unwrap();
        preview.stop().await.unwrap();

        assert_eq!(&output.calls()[2..], &[Call::Pause, Call::Clear]);
        assert!(preview.loaded_url().is_none());
    }

    #[tokio::test]
    async fn test_missing_output_is_capability_error() {
        let preview = PreviewBackend::new(None, Duration::from_millis(250));
        assert!(!preview.is_available());
        assert!(preview.play().await.unwrap_err().is_capability_error());
        assert!(preview.stop().await.is_ok());
        assert!(preview.subscribe().is_none());
    }

    #[tokio::test]
    async fn test_observe_tracks_position() {
        let output = RecordingOutput::new();
        let preview = backend(&output);

        let update = preview
            .observe(OutputEvent::TimeUpdate {
                position: Duration::from_secs(4),
            })
            .await;
        assert_eq!(update, PreviewUpdate::Position(Duration::from_secs(4)));
        assert_eq!(preview.position(), Duration::from_secs(4));

        let update = preview
            .observe(OutputEvent::Error {
                message: "decode".into(),
            })
            .await;
        assert_eq!(update, PreviewUpdate::Failed("decode".into()));
    }
}
