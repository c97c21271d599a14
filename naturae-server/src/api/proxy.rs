//! Proxies for Wikipedia, xeno-canto and remote images
//!
//! The browser cannot call these services directly (CORS, API keys,
//! mixed content), so the server fetches on its behalf.

use super::stream_response;
use crate::clients::images::{validate_image_url, ImageUrlError};
use crate::clients::wikipedia::WikipediaSummary;
use crate::clients::xeno_canto::Recording;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

const DEFAULT_LANG: &str = "nl";
const DEFAULT_RECORDING_LIMIT: usize = 5;
const MAX_RECORDING_LIMIT: usize = 20;
const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";
const AUDIO_CACHE_CONTROL: &str = "public, max-age=604800";

static LANG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{2,3}$").expect("LANG regex is valid"));

#[derive(Debug, Deserialize)]
pub struct WikipediaParams {
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AudioParams {
    pub name: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ImageParams {
    pub url: Option<String>,
}

/// Validated Wikipedia language code
fn wikipedia_lang(lang: Option<&str>) -> ApiResult<&str> {
    match lang.filter(|l| !l.is_empty()) {
        None => Ok(DEFAULT_LANG),
        Some(lang) if LANG.is_match(lang) => Ok(lang),
        Some(lang) => Err(ApiError::BadRequest(format!("Invalid language code '{}'", lang))),
    }
}

/// GET /api/wikipedia/:name?lang=
pub async fn wikipedia_summary(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<WikipediaParams>,
) -> ApiResult<Json<WikipediaSummary>> {
    let lang = wikipedia_lang(params.lang.as_deref())?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Missing page name".to_string()));
    }

    let summary = state.clients.wikipedia.summary(name, lang).await?;
    Ok(Json(summary))
}

/// GET /api/xeno-canto/audio?name=&limit=
pub async fn xeno_canto_audio(
    State(state): State<AppState>,
    Query(params): Query<AudioParams>,
) -> ApiResult<Json<Vec<Recording>>> {
    let name = params
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing query parameter name".to_string()))?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECORDING_LIMIT)
        .clamp(1, MAX_RECORDING_LIMIT);

    let recordings = state.clients.xeno_canto.search(name, limit).await?;
    Ok(Json(recordings))
}

/// GET /api/xeno-canto/stream/:id
pub async fn xeno_canto_stream(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::BadRequest(format!("Invalid recording id '{}'", id)));
    }

    let stream = state.clients.xeno_canto.stream(&id).await?;
    info!(recording_id = %id, content_type = %stream.content_type, "Streaming recording");
    stream_response(stream, AUDIO_CACHE_CONTROL)
}

/// GET /api/image-proxy?url=
pub async fn image_proxy(State(state): State<AppState>, Query(params): Query<ImageParams>) -> ApiResult<Response> {
    let raw = params
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing query parameter url".to_string()))?;

    let url = validate_image_url(raw).map_err(|e| match e {
        ImageUrlError::Invalid(msg) => ApiError::BadRequest(msg),
        ImageUrlError::HostNotAllowed(host) => {
            warn!(host = %host, "Refused image proxy request");
            ApiError::Forbidden(format!("Host '{}' is not allowed", host))
        }
    })?;

    let stream = state.clients.images.fetch(url).await?;
    stream_response(stream, IMAGE_CACHE_CONTROL)
}

/// Build proxy routes
pub fn proxy_routes() -> Router<AppState> {
    Router::new()
        .route("/api/wikipedia/:name", get(wikipedia_summary))
        .route("/api/xeno-canto/audio", get(xeno_canto_audio))
        .route("/api/xeno-canto/stream/:id", get(xeno_canto_stream))
        .route("/api/image-proxy", get(image_proxy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wikipedia_lang() {
        assert_eq!(wikipedia_lang(None).unwrap(), "nl");
        assert_eq!(wikipedia_lang(Some("")).unwrap(), "nl");
        assert_eq!(wikipedia_lang(Some("en")).unwrap(), "en");
        assert_eq!(wikipedia_lang(Some("nds")).unwrap(), "nds");
        assert!(wikipedia_lang(Some("EN")).is_err());
        assert!(wikipedia_lang(Some("en.evil.com")).is_err());
    }
}
