//! # Host Bridge Traits
//!
//! Platform abstraction traits implemented by each host.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the host
//! application. Each trait is a capability the core needs but cannot provide
//! portably: an audio handle, a streaming SDK session, HTTP, preference
//! storage and log forwarding.
//!
//! ## Traits
//!
//! ### Playback
//! - [`AudioOutput`](playback::AudioOutput) - Single reusable handle for preview clips
//! - [`StreamingSession`](playback::StreamingSession) - Authorized full-track streaming session
//!
//! ### Networking & Storage
//! - [`HttpClient`](http::HttpClient) - Async HTTP with host-controlled retry
//! - [`TrackSearch`](search::TrackSearch) - Catalogue search used to enrich tracks
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | HTTP + settings |
//! | Web      | host JS glue        | audio element + SDK session |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map authorization failures to `BridgeError::Unauthorized` so the core
//! can tell an expired session apart from a flaky network.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; implementations are shared across
//! tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod logging;
pub mod playback;
pub mod search;
pub mod storage;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{
    AudioOutput, OutputEvent, StreamingSession, StreamingSnapshot, StreamingStatus,
};
pub use search::{SearchHit, SearchQuery, TrackSearch};
pub use storage::SettingsStore;
