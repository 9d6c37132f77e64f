//! Integration tests for logging and event bus wiring

use bridge_traits::logging::LogLevel;
use core_runtime::events::{CoreEvent, EventBus, EventSeverity, PlaybackEvent, SessionEvent};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};

#[test]
fn test_init_logging_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());
}

#[test]
fn test_default_format_follows_build_profile() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_tokens_never_reach_logs() {
    assert_eq!(redact_if_sensitive("access_token", "BQC4..."), "[REDACTED]");
    assert_eq!(redact_if_sensitive("refresh_token", "AQB..."), "[REDACTED]");
    assert_eq!(redact_if_sensitive("streaming_uri", "spotify:track:1"), "spotify:track:1");
}

#[tokio::test]
async fn test_session_and_playback_events_share_bus() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe();

    bus.emit(CoreEvent::Session(SessionEvent::StatusChanged {
        connected: true,
        ready: false,
    }))
    .unwrap();
    bus.emit(CoreEvent::Playback(PlaybackEvent::VolumeChanged { volume: 0.3 }))
        .unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.description(), "Streaming session unavailable");
    assert_eq!(first.severity(), EventSeverity::Info);

    let second = rx.recv().await.unwrap();
    assert_eq!(
        second,
        CoreEvent::Playback(PlaybackEvent::VolumeChanged { volume: 0.3 })
    );
}
