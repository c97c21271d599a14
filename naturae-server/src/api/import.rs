//! Bulk import endpoints: pasted text lists and media files named after species

use super::media::{attach_upload, store_upload};
use super::owned_deck;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use naturae_common::db::{
    cards as card_db, decks as deck_db, media as media_db, species as species_db, Card, CardMedia, Species,
};
use naturae_common::export::MAX_IMPORT_CARDS;
use naturae_common::import::{self, FilenamePreview, ParsedFilename, SkippedLine, TextListPreview};
use naturae_common::text;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct FilenamesRequest {
    pub filenames: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileParams {
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct TextImportResult {
    pub created: Vec<Card>,
    pub skipped: Vec<SkippedLine>,
}

#[derive(Debug, Serialize)]
pub struct FileImportResult {
    pub card: Card,
    pub media: CardMedia,
    pub parsed: ParsedFilename,
}

/// Species for a scientific name, creating a manual record when unknown
///
/// Existing records are reused untouched so imports never overwrite names
/// fetched from GBIF.
async fn species_for_name(state: &AppState, scientific_name: &str, dutch_name: Option<&str>) -> ApiResult<Species> {
    if let Some(species) = species_db::find_by_scientific_name(&state.db, scientific_name).await? {
        return Ok(species);
    }
    let species = species_db::upsert_species(&state.db, &Species::manual(scientific_name, dutch_name)).await?;
    debug!(species_id = %species.id, scientific_name = %scientific_name, "Created species from import");
    Ok(species)
}

/// POST /api/import/text/preview
pub async fn preview_text(_user: AuthUser, Json(request): Json<TextRequest>) -> Json<TextListPreview> {
    Json(import::parse_text_list(&request.text))
}

async fn insert_text_row(
    state: &AppState,
    deck_id: Uuid,
    scientific_name: Option<&str>,
    front_text: String,
    back_text: String,
) -> ApiResult<Card> {
    let species = match scientific_name {
        Some(name) => Some(species_for_name(state, name, Some(front_text.as_str())).await?),
        None => None,
    };

    let card = card_db::insert_card(
        &state.db,
        deck_id,
        &card_db::NewCard {
            front_text,
            back_text,
            position: None,
            species_id: species.as_ref().map(|s| s.id),
            species_display: species.as_ref().map(Species::display_name),
        },
    )
    .await?;
    Ok(card)
}

/// Remove a card whose upload could not be attached, and its file when no
/// other media row uses it
async fn discard_imported_card(state: &AppState, card_id: Uuid, deck_id: Uuid, storage_path: &str) -> ApiResult<()> {
    card_db::delete_card(&state.db, card_id).await?;
    deck_db::refresh_card_count(&state.db, deck_id).await?;

    let _files = state.media.lock_files().await;
    if media_db::count_storage_references(&state.db, storage_path).await? == 0 {
        if let Err(e) = state.media.delete(storage_path).await {
            warn!(storage_path = %storage_path, error = %e, "Failed to delete media file");
        }
    }
    Ok(())
}

/// POST /api/decks/:id/import/text
///
/// Creates one card per parsed row, appended to the deck. Either every row
/// becomes a card or none does.
pub async fn import_text(
    State(state): State<AppState>,
    user: AuthUser,
    Path(deck_id): Path<Uuid>,
    Json(request): Json<TextRequest>,
) -> ApiResult<(StatusCode, Json<TextImportResult>)> {
    owned_deck(&state, deck_id, &user.user_id).await?;

    let preview = import::parse_text_list(&request.text);
    if preview.rows.is_empty() {
        return Err(ApiError::BadRequest("No cards found in the pasted text".to_string()));
    }
    if preview.rows.len() > MAX_IMPORT_CARDS {
        return Err(ApiError::BadRequest(format!(
            "Too many lines: {} (maximum {})",
            preview.rows.len(),
            MAX_IMPORT_CARDS
        )));
    }

    // Every row is checked before anything is written
    let mut validated = Vec::with_capacity(preview.rows.len());
    for row in &preview.rows {
        let texts = text::validate_card_text(&row.front_text, &row.back_text).map_err(|e| match e {
            naturae_common::Error::InvalidInput(msg) => ApiError::BadRequest(format!("Line {}: {}", row.line, msg)),
            other => other.into(),
        })?;
        validated.push((row, texts));
    }

    let mut created = Vec::with_capacity(validated.len());
    for (row, (front_text, back_text)) in validated {
        match insert_text_row(&state, deck_id, row.scientific_name.as_deref(), front_text, back_text).await {
            Ok(card) => created.push(card),
            Err(e) => {
                warn!(deck_id = %deck_id, line = row.line, error = %e, "Text import failed, removing created cards");
                for card in &created {
                    card_db::delete_card(&state.db, card.id).await?;
                }
                deck_db::refresh_card_count(&state.db, deck_id).await?;
                return Err(e);
            }
        }
    }
    deck_db::refresh_card_count(&state.db, deck_id).await?;

    info!(
        deck_id = %deck_id,
        separator = ?preview.separator,
        created = created.len(),
        skipped = preview.skipped.len(),
        "Imported text list"
    );
    Ok((
        StatusCode::CREATED,
        Json(TextImportResult {
            created,
            skipped: preview.skipped,
        }),
    ))
}

/// POST /api/import/filenames/preview
pub async fn preview_files(_user: AuthUser, Json(request): Json<FilenamesRequest>) -> ApiResult<Json<Vec<FilenamePreview>>> {
    if request.filenames.len() > MAX_IMPORT_CARDS {
        return Err(ApiError::BadRequest(format!(
            "Too many files: {} (maximum {})",
            request.filenames.len(),
            MAX_IMPORT_CARDS
        )));
    }
    Ok(Json(import::preview_filenames(&request.filenames)))
}

/// POST /api/decks/:id/import/file?filename=
///
/// Body is the raw file. Creates a card named after the file with the file
/// attached, linked to a species when the name contains a scientific name.
pub async fn import_file(
    State(state): State<AppState>,
    user: AuthUser,
    Path(deck_id): Path<Uuid>,
    Query(params): Query<FileParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<FileImportResult>)> {
    owned_deck(&state, deck_id, &user.user_id).await?;

    let parsed = import::parse_filename(&params.filename);
    if parsed.media_type.is_none() {
        return Err(ApiError::BadRequest(format!(
            "Unsupported file '{}'; upload an image or audio file",
            params.filename
        )));
    }
    let front = parsed.front_text();
    if front.is_empty() {
        return Err(ApiError::BadRequest(format!("No name found in '{}'", params.filename)));
    }
    let (front_text, back_text) = text::validate_card_text(&front, &parsed.back_text())?;

    let species = match parsed.scientific_name.as_deref() {
        Some(name) => Some(species_for_name(&state, name, parsed.dutch_name.as_deref()).await?),
        None => None,
    };

    let (stored, media_type) = store_upload(&state, &user.user_id, &params.filename, &body).await?;

    let card = card_db::insert_card(
        &state.db,
        deck_id,
        &card_db::NewCard {
            front_text,
            back_text,
            position: None,
            species_id: species.as_ref().map(|s| s.id),
            species_display: species.as_ref().map(Species::display_name),
        },
    )
    .await;
    let card = match card {
        Ok(card) => card,
        Err(e) => {
            naturae_common::quota::release(&state.db, &user.user_id, stored.size_bytes).await?;
            return Err(e.into());
        }
    };

    let storage_path = stored.storage_path.clone();
    let media = match attach_upload(&state, &user.user_id, card.id, stored, media_type, &body).await {
        Ok(media) => media,
        Err(e) => {
            discard_imported_card(&state, card.id, deck_id, &storage_path).await?;
            return Err(e);
        }
    };
    deck_db::refresh_card_count(&state.db, deck_id).await?;

    info!(
        deck_id = %deck_id,
        card_id = %card.id,
        pattern = ?parsed.pattern,
        species = ?species.as_ref().map(|s| s.scientific_name.as_str()),
        "Imported file"
    );
    Ok((StatusCode::CREATED, Json(FileImportResult { card, media, parsed })))
}

/// Build bulk import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/import/text/preview", post(preview_text))
        .route("/api/import/filenames/preview", post(preview_files))
        .route("/api/decks/:id/import/text", post(import_text))
        .route("/api/decks/:id/import/file", post(import_file))
}
