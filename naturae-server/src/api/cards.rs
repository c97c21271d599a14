//! Card endpoints (deck owner only)

use super::{owned_card, owned_deck};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{patch, post},
    Json, Router,
};
use naturae_common::db::{cards as card_db, decks as deck_db, media as media_db, species as species_db, Card};
use naturae_common::{quota, text};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub front_text: String,
    #[serde(default)]
    pub back_text: String,
    pub position: Option<i64>,
    pub species_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCardRequest {
    pub front_text: Option<String>,
    pub back_text: Option<String>,
    pub species_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub card_ids: Vec<Uuid>,
}

/// Display label of a species that must exist
async fn species_display(state: &AppState, species_id: Uuid) -> ApiResult<String> {
    let species = species_db::load_species(&state.db, species_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown species {}", species_id)))?;
    Ok(species.display_name())
}

/// POST /api/decks/:id/cards
pub async fn create_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(deck_id): Path<Uuid>,
    Json(request): Json<CreateCardRequest>,
) -> ApiResult<(StatusCode, Json<Card>)> {
    owned_deck(&state, deck_id, &user.user_id).await?;

    let (front_text, back_text) = text::validate_card_text(&request.front_text, &request.back_text)?;
    let species_display = match request.species_id {
        Some(id) => Some(species_display(&state, id).await?),
        None => None,
    };

    let card = card_db::insert_card(
        &state.db,
        deck_id,
        &card_db::NewCard {
            front_text,
            back_text,
            position: request.position,
            species_id: request.species_id,
            species_display,
        },
    )
    .await?;
    deck_db::refresh_card_count(&state.db, deck_id).await?;

    info!(deck_id = %deck_id, card_id = %card.id, "Created card");
    Ok((StatusCode::CREATED, Json(card)))
}

/// PATCH /api/cards/:id
pub async fn update_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCardRequest>,
) -> ApiResult<Json<Card>> {
    let (current, _) = owned_card(&state, id, &user.user_id).await?;

    let front = request.front_text.as_deref().unwrap_or(&current.front_text);
    let back = request.back_text.as_deref().unwrap_or(&current.back_text);
    let (front_text, back_text) = text::validate_card_text(front, back)?;

    let species_display = match request.species_id {
        Some(species_id) => Some(species_display(&state, species_id).await?),
        None => None,
    };

    let card = card_db::update_card(
        &state.db,
        id,
        &card_db::CardUpdate {
            front_text: Some(front_text),
            back_text: Some(back_text),
            species_id: request.species_id,
            species_display,
        },
    )
    .await?;

    info!(card_id = %id, "Updated card");
    Ok(Json(card))
}

/// Release quota for a card's uploaded files and remove files no other row uses
///
/// Must run after the media rows are gone.
pub(crate) async fn release_stored_files(state: &AppState, user_id: &str, files: &[(String, i64)]) -> ApiResult<()> {
    let total: i64 = files.iter().map(|(_, size)| size).sum();
    quota::release(&state.db, user_id, total).await?;

    let _files = state.media.lock_files().await;
    for (storage_path, _) in files {
        if media_db::count_storage_references(&state.db, storage_path).await? > 0 {
            continue;
        }
        if let Err(e) = state.media.delete(storage_path).await {
            warn!(storage_path = %storage_path, error = %e, "Failed to delete media file");
        }
    }
    Ok(())
}

/// DELETE /api/cards/:id
pub async fn delete_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (card, _) = owned_card(&state, id, &user.user_id).await?;

    let files = media_db::stored_files_for_card(&state.db, id).await?;
    if !card_db::delete_card(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Card {}", id)));
    }
    release_stored_files(&state, &user.user_id, &files).await?;
    deck_db::refresh_card_count(&state.db, card.deck_id).await?;

    info!(card_id = %id, deck_id = %card.deck_id, files = files.len(), "Deleted card");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/decks/:id/cards/reorder
pub async fn reorder_cards(
    State(state): State<AppState>,
    user: AuthUser,
    Path(deck_id): Path<Uuid>,
    Json(request): Json<ReorderRequest>,
) -> ApiResult<Json<Vec<Card>>> {
    owned_deck(&state, deck_id, &user.user_id).await?;

    card_db::reorder_cards(&state.db, deck_id, &request.card_ids).await?;
    let cards = card_db::list_cards(&state.db, deck_id).await?;

    info!(deck_id = %deck_id, cards = cards.len(), "Reordered cards");
    Ok(Json(cards))
}

/// Build card routes
pub fn card_routes() -> Router<AppState> {
    Router::new()
        .route("/api/decks/:id/cards", post(create_card))
        .route("/api/decks/:id/cards/reorder", post(reorder_cards))
        .route("/api/cards/:id", patch(update_card).delete(delete_card))
}
