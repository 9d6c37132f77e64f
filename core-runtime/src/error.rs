use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Startup errors: config validation, default bridge construction and
/// logging initialization.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid tuning value or logging setup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host bridge was neither injected nor available as a
    /// desktop default.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the host can fix this by injecting a bridge implementation.
    pub fn is_capability_missing(&self) -> bool {
        matches!(self, Error::CapabilityMissing { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
