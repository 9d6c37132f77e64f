//! Authenticated access to the Spotify Web API.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::token::AccessToken;
use crate::types::ErrorResponse;

/// Spotify Web API base URL
pub const API_BASE: &str = "https://api.spotify.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds bearer-authorized requests and maps Spotify status codes onto
/// [`ProviderError`].
#[derive(Clone)]
pub struct SpotifyApi {
    http_client: Arc<dyn HttpClient>,
    token: AccessToken,
    base_url: String,
}

impl SpotifyApi {
    pub fn new(http_client: Arc<dyn HttpClient>, token: AccessToken) -> Self {
        Self {
            http_client,
            token,
            base_url: API_BASE.to_string(),
        }
    }

    /// Point at another host, e.g. a local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    /// Request for `path` (relative to the API base) carrying the current
    /// bearer token.
    pub fn request(&self, method: HttpMethod, path: &str) -> Result<HttpRequest> {
        let token = self.token.get().ok_or(ProviderError::NoAccessToken)?;
        Ok(HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT))
    }

    /// Execute `request` and return the response when it is a 2xx.
    pub async fn send(&self, request: HttpRequest, policy: RetryPolicy) -> Result<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();
        let response = self.http_client.execute_with_retry(request, policy).await?;
        debug!(?method, %url, status = response.status, "Spotify API response");
        check_status(response)
    }
}

fn check_status(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorResponse>()
        .map(|body| body.error.message)
        .unwrap_or_else(|_| response.text_lossy());

    match response.status {
        401 => {
            warn!(%message, "Spotify rejected the access token");
            Err(ProviderError::AuthenticationFailed(message))
        }
        429 => {
            let retry_after_seconds = header(&response, "retry-after")
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(1);
            Err(ProviderError::RateLimitExceeded {
                retry_after_seconds,
            })
        }
        status_code => Err(ProviderError::ApiError {
            status_code,
            message,
        }),
    }
}

fn header<'a>(response: &'a HttpResponse, name: &str) -> Option<&'a str> {
    response
        .headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
