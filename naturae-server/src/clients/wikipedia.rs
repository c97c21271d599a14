//! Wikipedia REST client (page summaries)

use super::{check_status, http_client, ClientError};
use naturae_common::text::{truncate_extract, EXTRACT_MAX_CHARS};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Summary returned to the client
#[derive(Debug, Clone, Serialize)]
pub struct WikipediaSummary {
    pub title: String,
    pub extract: String,
    pub thumbnail: Option<String>,
    pub page_url: Option<String>,
    pub lang: String,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(rename = "type")]
    page_type: Option<String>,
    thumbnail: Option<Thumbnail>,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: String,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: String,
}

pub struct WikipediaClient {
    http_client: reqwest::Client,
    /// Base URL containing a `{lang}` placeholder
    base_url: String,
}

impl WikipediaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Summary URL for a title; the title is one percent-encoded path segment
    fn summary_url(&self, title: &str, lang: &str) -> Result<Url, ClientError> {
        let base = self.base_url.replace("{lang}", lang);
        let mut url = Url::parse(&format!("{}/page/summary", base))
            .map_err(|e| ClientError::Parse(format!("Invalid Wikipedia URL '{}': {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Parse(format!("Wikipedia URL '{}' cannot have a path", base)))?
            .push(&title.trim().replace(' ', "_"));
        Ok(url)
    }

    /// Article summary with the extract cut to the display length
    ///
    /// Disambiguation pages count as not found.
    pub async fn summary(&self, title: &str, lang: &str) -> Result<WikipediaSummary, ClientError> {
        let url = self.summary_url(title, lang)?;
        tracing::debug!(title = %title, lang = %lang, url = %url, "Querying Wikipedia summary");

        let what = format!("Wikipedia page '{}'", title);
        let response = self.http_client.get(url).send().await?;
        let summary: SummaryResponse = check_status(response, &what).await?.json().await?;

        if summary.page_type.as_deref() == Some("disambiguation") {
            return Err(ClientError::NotFound(what));
        }

        tracing::info!(title = %summary.title, lang = %lang, "Retrieved Wikipedia summary");

        Ok(WikipediaSummary {
            extract: truncate_extract(&summary.extract, EXTRACT_MAX_CHARS),
            title: summary.title,
            thumbnail: summary.thumbnail.map(|t| t.source),
            page_url: summary.content_urls.and_then(|c| c.desktop).map(|d| d.page),
            lang: lang.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_url_encodes_title() {
        let client = WikipediaClient::new("https://{lang}.wikipedia.org/api/rest_v1", 5).unwrap();
        let url = client.summary_url("Grote bonte specht", "nl").unwrap();
        assert_eq!(
            url.as_str(),
            "https://nl.wikipedia.org/api/rest_v1/page/summary/Grote_bonte_specht"
        );

        let url = client.summary_url("AC/DC?", "en").unwrap();
        assert_eq!(url.as_str(), "https://en.wikipedia.org/api/rest_v1/page/summary/AC%2FDC%3F");
    }
}
