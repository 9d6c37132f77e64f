//! # Playback Coordinator
//!
//! Queue ownership and backend arbitration for the player.
//!
//! ## Overview
//!
//! Two independently clocked backends can play a track:
//! - the **preview** output, a single reusable media handle for short clips
//! - the **streaming** session, an authorized remote full-track player
//!
//! [`PlaybackCoordinator`] decides per track which one (if any) plays it,
//! switches between them transparently and projects both event models onto
//! one [`PlaybackState`].
//!
//! ## Modules
//!
//! - [`track`]: queued track value objects
//! - [`resolver`]: enrichment of under-specified tracks via catalogue search
//! - [`preview`] / [`streaming`]: backend adapters
//! - [`status`]: streaming readiness bridge
//! - [`volume`]: persisted volume preference
//! - [`coordinator`]: the state machine

pub mod coordinator;
pub mod error;
pub mod preview;
pub mod resolver;
pub mod state;
pub mod status;
pub mod streaming;
pub mod track;
pub mod volume;

pub use coordinator::{CoordinatorDeps, PlaybackCoordinator};
pub use error::{PlaybackError, Result};
pub use preview::{PreviewBackend, PreviewUpdate};
pub use resolver::SourceResolver;
pub use state::{PlaybackSource, PlaybackState, TrackPhase};
pub use status::{status_channel, StatusBridge, StatusPublisher};
pub use streaming::{StreamingBackend, StreamingUpdate};
pub use track::{Provenance, Track};
pub use volume::VolumeController;
