//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the playback crates:
//! - Logging and tracing bootstrap
//! - Player configuration with validation
//! - Event bus for discrete playback and session transitions
//!
//! Everything here is host-neutral; platform capabilities arrive through
//! `bridge-traits` implementations injected into [`config::PlayerConfig`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
