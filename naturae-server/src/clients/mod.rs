//! HTTP clients for external services
//!
//! Each client wraps one upstream API. Failures are reported as
//! [`ClientError`]; handlers turn them into 404 or 502 responses.

pub mod auth_provider;
pub mod gbif;
pub mod images;
pub mod wikipedia;
pub mod xeno_canto;

pub use auth_provider::{AuthProviderClient, AuthSession, AuthSessionUser};
pub use gbif::{GbifClient, GbifMedia, GbifSpecies};
pub use images::ImageFetcher;
pub use wikipedia::{WikipediaClient, WikipediaSummary};
pub use xeno_canto::{Recording, XenoCantoClient};

use naturae_common::config::Settings;
use std::time::Duration;
use thiserror::Error;

pub const USER_AGENT: &str = concat!("Naturae/", env!("CARGO_PKG_VERSION"));

/// Longest upstream error body kept for logging
const MAX_ERROR_BODY: usize = 300;

/// External client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ClientError::Network(e.to_string()))
}

/// Turn non-success statuses into errors; 404 becomes `NotFound(what)`
pub(crate) async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(what.to_string()));
    }

    if !status.is_success() {
        let error_text: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(MAX_ERROR_BODY)
            .collect();
        return Err(ClientError::Api(status.as_u16(), error_text));
    }

    Ok(response)
}

/// Successful upstream response whose body is passed through unbuffered
pub struct MediaStream {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub response: reqwest::Response,
}

impl MediaStream {
    pub(crate) fn new(response: reqwest::Response, fallback_type: &str) -> Self {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(fallback_type)
            .to_string();

        Self {
            content_type,
            content_length: response.content_length(),
            response,
        }
    }
}

/// All external clients, built once at startup
pub struct ExternalClients {
    pub gbif: GbifClient,
    pub wikipedia: WikipediaClient,
    pub xeno_canto: XenoCantoClient,
    pub images: ImageFetcher,
    pub auth: AuthProviderClient,
}

impl ExternalClients {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        let external = &settings.external;

        Ok(Self {
            gbif: GbifClient::new(&external.gbif_url, external.timeout_secs)?,
            wikipedia: WikipediaClient::new(&external.wikipedia_url, external.timeout_secs)?,
            xeno_canto: XenoCantoClient::new(
                &external.xeno_canto_url,
                external.xeno_canto_key.clone(),
                external.timeout_secs,
            )?,
            images: ImageFetcher::new(external.timeout_secs)?,
            auth: AuthProviderClient::new(&settings.auth.url, &settings.auth.api_key, external.timeout_secs)?,
        })
    }
}
