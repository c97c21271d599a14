//! naturae-server library
//!
//! HTTP backend of Naturae: decks, cards, media, study progress and the
//! proxies for external species data.

use axum::{extract::DefaultBodyLimit, Router};
use naturae_common::config::Settings;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod api;
pub mod auth;
pub mod clients;
pub mod error;
pub mod pagination;
pub mod storage;

pub use error::{ApiError, ApiResult};

use clients::{ClientError, ExternalClients};
use storage::{MediaStore, MEDIA_URL_PREFIX};

/// Slack on top of the largest upload for request framing
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved configuration
    pub settings: Arc<Settings>,
    /// External service clients
    pub clients: Arc<ExternalClients>,
    /// Uploaded media files
    pub media: MediaStore,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, settings: Settings) -> Result<Self, ClientError> {
        let clients = ExternalClients::new(&settings)?;
        let media = MediaStore::new(settings.media_dir.clone());

        Ok(Self {
            db,
            settings: Arc::new(settings),
            clients: Arc::new(clients),
            media,
        })
    }

    /// Whether cookies should carry the `Secure` flag
    pub fn secure_cookies(&self) -> bool {
        self.settings.public_url.starts_with("https://")
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.settings.quota.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_SLACK);
    let media_files = ServeDir::new(state.media.root().to_path_buf());

    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::deck_routes())
        .merge(api::card_routes())
        .merge(api::import_routes())
        .merge(api::media_routes())
        .merge(api::study_routes())
        .merge(api::profile_routes())
        .merge(api::species_routes())
        .merge(api::proxy_routes())
        .nest_service(MEDIA_URL_PREFIX, media_files)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
