//! Error types for the Spotify provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Spotify Web API errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// No access token has been supplied yet
    #[error("No Spotify access token available")]
    NoAccessToken,

    /// The token was rejected (401/403)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No Connect device to target
    #[error("No playback device available")]
    NoDevice,

    /// API request returned an error
    #[error("Spotify API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for Spotify operations
pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<ProviderError> for BridgeError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::NoAccessToken => {
                BridgeError::Unauthorized("No Spotify access token available".to_string())
            }
            ProviderError::AuthenticationFailed(msg) => BridgeError::Unauthorized(msg),
            ProviderError::NoDevice => {
                BridgeError::NotAvailable("No playback device available".to_string())
            }
            ProviderError::ApiError {
                status_code: 404,
                message,
            } => BridgeError::NotAvailable(format!("API error (status 404): {}", message)),
            ProviderError::ApiError {
                status_code,
                message,
            } if (400..500).contains(&status_code) => BridgeError::Rejected(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            ProviderError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            ProviderError::RateLimitExceeded {
                retry_after_seconds,
            } => BridgeError::OperationFailed(format!(
                "Rate limit exceeded, retry after {} seconds",
                retry_after_seconds
            )),
            ProviderError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            ProviderError::Bridge(e) => e,
        }
    }
}
