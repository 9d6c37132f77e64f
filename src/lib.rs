//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (`core-service`, `core-playback`, `provider-spotify`). Host
//! applications can depend on `moodplay-workspace` and enable the documented
//! features instead of wiring each crate by hand.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "playback-only")]
pub use core_playback as playback;

#[cfg(feature = "spotify")]
pub use provider_spotify as spotify;
