//! Media endpoints: uploads, annotations and removal (deck owner only)

use super::cards::release_stored_files;
use super::owned_card;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::storage::StoredFile;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use naturae_common::annotations::{self, Annotation};
use naturae_common::db::{media as media_db, CardMedia, MediaType};
use naturae_common::import::filename::{media_type_for_extension, parse_filename};
use naturae_common::quota;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct AnnotationsRequest {
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub annotated_url: Option<String>,
}

/// Check quota, then write an uploaded file to disk
///
/// The quota is charged before the write and refunded if the write fails.
pub(crate) async fn store_upload(
    state: &AppState,
    user_id: &str,
    filename: &str,
    bytes: &[u8],
) -> ApiResult<(StoredFile, MediaType)> {
    let extension = parse_filename(filename)
        .extension
        .ok_or_else(|| ApiError::BadRequest(format!("File '{}' has no extension", filename)))?;
    let media_type = media_type_for_extension(&extension).ok_or_else(|| {
        ApiError::BadRequest(format!("Unsupported file type '.{}'; upload an image or audio file", extension))
    })?;

    let size = bytes.len() as i64;
    quota::reserve(&state.db, user_id, size, &state.settings.quota).await?;

    match state.media.save(user_id, &extension, bytes).await {
        Ok(stored) => Ok((stored, media_type)),
        Err(e) => {
            quota::release(&state.db, user_id, size).await?;
            Err(e.into())
        }
    }
}

/// Insert the media row for a stored upload, refunding the quota on failure
///
/// `bytes` are the uploaded content, rewritten if a concurrent delete removed
/// the shared file before the row was in place.
pub(crate) async fn attach_upload(
    state: &AppState,
    user_id: &str,
    card_id: Uuid,
    stored: StoredFile,
    media_type: MediaType,
    bytes: &[u8],
) -> ApiResult<CardMedia> {
    let size = stored.size_bytes;
    let storage_path = stored.storage_path.clone();
    let new_media = media_db::NewMedia {
        media_type,
        url: stored.url,
        position: None,
        annotations: Vec::new(),
        annotated_url: None,
        size_bytes: size,
        storage_path: Some(stored.storage_path),
    };

    match media_db::insert_media(&state.db, card_id, &new_media).await {
        Ok(media) => {
            let _files = state.media.lock_files().await;
            state.media.restore_if_missing(&storage_path, bytes).await?;
            Ok(media)
        }
        Err(e) => {
            quota::release(&state.db, user_id, size).await?;
            Err(e.into())
        }
    }
}

/// POST /api/cards/:id/media?filename=
///
/// Body is the raw file.
pub async fn upload_media(
    State(state): State<AppState>,
    user: AuthUser,
    Path(card_id): Path<Uuid>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<CardMedia>)> {
    owned_card(&state, card_id, &user.user_id).await?;

    let (stored, media_type) = store_upload(&state, &user.user_id, &params.filename, &body).await?;
    let media = attach_upload(&state, &user.user_id, card_id, stored, media_type, &body).await?;

    info!(
        card_id = %card_id,
        media_id = %media.id,
        media_type = media.media_type.as_str(),
        size = media.size_bytes,
        "Uploaded media"
    );
    Ok((StatusCode::CREATED, Json(media)))
}

/// Media row with its card, which the caller must own
async fn owned_media(state: &AppState, id: Uuid, user_id: &str) -> ApiResult<CardMedia> {
    let media = media_db::load_media(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Media {}", id)))?;
    owned_card(state, media.card_id, user_id).await?;
    Ok(media)
}

/// PUT /api/media/:id/annotations
pub async fn update_annotations(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AnnotationsRequest>,
) -> ApiResult<Json<CardMedia>> {
    let media = owned_media(&state, id, &user.user_id).await?;
    if media.media_type != MediaType::Image {
        return Err(ApiError::BadRequest("Only images can be annotated".to_string()));
    }

    annotations::validate(&request.annotations)?;
    let annotated_url = request
        .annotated_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    let media = media_db::update_annotations(&state.db, id, &request.annotations, annotated_url).await?;

    info!(media_id = %id, count = request.annotations.len(), "Updated annotations");
    Ok(Json(media))
}

/// DELETE /api/media/:id
pub async fn delete_media(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let media = owned_media(&state, id, &user.user_id).await?;

    if !media_db::delete_media(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Media {}", id)));
    }
    if let Some(storage_path) = media.storage_path {
        release_stored_files(&state, &user.user_id, &[(storage_path, media.size_bytes)]).await?;
    }

    info!(media_id = %id, card_id = %media.card_id, "Deleted media");
    Ok(StatusCode::NO_CONTENT)
}

/// Build media routes
pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cards/:id/media", post(upload_media))
        .route("/api/media/:id/annotations", put(update_annotations))
        .route("/api/media/:id", axum::routing::delete(delete_media))
}
