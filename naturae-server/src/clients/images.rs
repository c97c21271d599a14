//! Remote image fetching for the image proxy
//!
//! Only hosts on the allow-list are fetched. Redirects are followed only
//! while they stay on the allow-list.

use super::{check_status, ClientError, MediaStream, USER_AGENT};
use reqwest::{redirect, Url};
use std::time::Duration;

/// Image hosts the proxy may fetch from; subdomains are included
pub const ALLOWED_IMAGE_HOSTS: &[&str] = &[
    "observation.org",
    "waarneming.nl",
    "inaturalist-open-data.s3.amazonaws.com",
    "static.inaturalist.org",
    "staticflickr.com",
];

const MAX_REDIRECTS: usize = 5;

/// Why a proxy target URL was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageUrlError {
    /// Not an absolute http(s) URL
    Invalid(String),
    /// Host outside the allow-list
    HostNotAllowed(String),
}

/// Host equals an allowed domain or is a subdomain of one
pub fn is_allowed_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    ALLOWED_IMAGE_HOSTS.iter().any(|allowed| {
        host == *allowed
            || host
                .strip_suffix(allowed)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Parse a proxy target and check it against the allow-list
pub fn validate_image_url(raw: &str) -> Result<Url, ImageUrlError> {
    let url = Url::parse(raw.trim()).map_err(|e| ImageUrlError::Invalid(format!("Invalid url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ImageUrlError::Invalid(format!(
            "Unsupported url scheme '{}'",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ImageUrlError::Invalid("Url has no host".to_string()))?;

    if !is_allowed_host(host) {
        return Err(ImageUrlError::HostNotAllowed(host.to_string()));
    }

    Ok(url)
}

pub struct ImageFetcher {
    http_client: reqwest::Client,
}

impl ImageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, ClientError> {
        let policy = redirect::Policy::custom(|attempt| {
            let allowed = attempt.url().host_str().is_some_and(is_allowed_host);
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if allowed {
                attempt.follow()
            } else {
                attempt.stop()
            }
        });

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(policy)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self { http_client })
    }

    /// Fetch an already validated image URL
    ///
    /// Responses that are not images are rejected.
    pub async fn fetch(&self, url: Url) -> Result<MediaStream, ClientError> {
        tracing::debug!(url = %url, "Proxying image");

        let response = self.http_client.get(url.clone()).send().await?;
        let response = check_status(response, &format!("image {}", url)).await?;

        let stream = MediaStream::new(response, "application/octet-stream");
        if !stream.content_type.starts_with("image/") {
            return Err(ClientError::Api(
                502,
                format!("{} returned content type {}", url, stream.content_type),
            ));
        }

        Ok(stream)
    }
}
