//! Deck endpoints: listing, browsing, CRUD, likes, export and import

use super::{owned_deck, readable_deck};
use crate::auth::{AuthUser, MaybeUser};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, Pagination, PAGE_SIZE};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use naturae_common::db::{
    cards as card_db, decks as deck_db, likes, media as media_db, Card, CardMedia, Deck,
};
use naturae_common::export::{self, ExportDocument};
use naturae_common::text;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Card with its media, as shown on the deck page
#[derive(Debug, Serialize)]
pub struct CardView {
    #[serde(flatten)]
    pub card: Card,
    pub media: Vec<CardMedia>,
}

#[derive(Debug, Serialize)]
pub struct DeckDetail {
    pub deck: Deck,
    pub cards: Vec<CardView>,
    pub liked: bool,
    pub is_owner: bool,
}

#[derive(Debug, Serialize)]
pub struct DeckPage {
    pub decks: Vec<Deck>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct PublicDecksParams {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeckRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeckRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub deck: Deck,
    pub cards_imported: usize,
}

/// GET /api/decks
pub async fn list_my_decks(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Deck>>> {
    let decks = deck_db::list_user_decks(&state.db, &user.user_id).await?;
    Ok(Json(decks))
}

/// GET /api/decks/public?q=&sort=popular|newest&page=
pub async fn list_public_decks(
    State(state): State<AppState>,
    Query(params): Query<PublicDecksParams>,
) -> ApiResult<Json<DeckPage>> {
    let sort = match params.sort.as_deref().filter(|s| !s.is_empty()) {
        None => deck_db::DeckSort::default(),
        Some(value) => deck_db::DeckSort::parse(value)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown sort '{}', use popular or newest", value)))?,
    };
    let search = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let total = deck_db::count_public_decks(&state.db, search).await?;
    let pagination = calculate_pagination(total, params.page.unwrap_or(1));
    let decks = deck_db::list_public_decks(&state.db, search, sort, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(DeckPage { decks, pagination }))
}

/// POST /api/decks
pub async fn create_deck(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateDeckRequest>,
) -> ApiResult<(StatusCode, Json<Deck>)> {
    let new_deck = deck_db::NewDeck {
        title: text::validate_title(&request.title)?,
        description: text::validate_description(request.description.as_deref())?,
        is_public: request.is_public,
    };

    let deck = deck_db::create_deck(&state.db, &user.user_id, &new_deck).await?;
    info!(deck_id = %deck.id, user_id = %user.user_id, "Created deck");

    Ok((StatusCode::CREATED, Json(deck)))
}

/// GET /api/decks/:id
pub async fn get_deck(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeckDetail>> {
    let deck = readable_deck(&state, id, user.user_id()).await?;

    let cards = card_db::list_cards(&state.db, id).await?;
    let mut media = media_db::list_media_for_deck(&state.db, id).await?;
    let cards = cards
        .into_iter()
        .map(|card| CardView {
            media: media.remove(&card.id).unwrap_or_default(),
            card,
        })
        .collect();

    let liked = match user.user_id() {
        Some(user_id) => likes::is_liked(&state.db, user_id, id).await?,
        None => false,
    };
    let is_owner = user.user_id().is_some_and(|u| deck.is_owned_by(u));

    Ok(Json(DeckDetail {
        deck,
        cards,
        liked,
        is_owner,
    }))
}

/// PATCH /api/decks/:id
pub async fn update_deck(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDeckRequest>,
) -> ApiResult<Json<Deck>> {
    owned_deck(&state, id, &user.user_id).await?;

    let update = deck_db::DeckUpdate {
        title: request.title.as_deref().map(text::validate_title).transpose()?,
        description: match request.description.as_deref() {
            None => None,
            Some(value) => Some(text::validate_description(Some(value))?.unwrap_or_default()),
        },
        is_public: request.is_public,
    };

    let deck = deck_db::update_deck(&state.db, id, &update).await?;
    info!(deck_id = %id, is_public = deck.is_public, "Updated deck");
    Ok(Json(deck))
}

/// DELETE /api/decks/:id
pub async fn delete_deck(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    owned_deck(&state, id, &user.user_id).await?;

    if !deck_db::soft_delete_deck(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("Deck {}", id)));
    }

    info!(deck_id = %id, user_id = %user.user_id, "Deleted deck");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/decks/:id/like
///
/// Responds with the state after the toggle so the client can reconcile an
/// optimistic update.
pub async fn toggle_like(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<likes::LikeState>> {
    readable_deck(&state, id, Some(&user.user_id)).await?;

    let like_state = likes::toggle_like(&state.db, &user.user_id, id).await?;
    info!(deck_id = %id, liked = like_state.liked, like_count = like_state.like_count, "Toggled like");
    Ok(Json(like_state))
}

/// GET /api/decks/:id/export
pub async fn export_deck(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let deck = readable_deck(&state, id, user.user_id()).await?;
    let cards = card_db::list_cards(&state.db, id).await?;
    let media = media_db::list_media_for_deck(&state.db, id).await?;

    let document = export::build_export(&deck, &cards, &media, Utc::now());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::export_filename(&deck.title)
    );

    info!(deck_id = %id, cards = document.cards.len(), "Exported deck");
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(document)))
}

/// POST /api/decks/import
///
/// Imported decks start out private.
pub async fn import_deck(
    State(state): State<AppState>,
    user: AuthUser,
    Json(document): Json<ExportDocument>,
) -> ApiResult<(StatusCode, Json<ImportResponse>)> {
    export::validate_import(&document)?;

    let deck = deck_db::create_deck(
        &state.db,
        &user.user_id,
        &deck_db::NewDeck {
            title: text::validate_title(&document.deck.title)?,
            description: text::validate_description(document.deck.description.as_deref())?,
            is_public: false,
        },
    )
    .await?;

    let mut cards = document.cards;
    cards.sort_by_key(|c| c.position);

    for (position, card) in cards.iter().enumerate() {
        let (front_text, back_text) = text::validate_card_text(&card.front_text, &card.back_text)?;
        let inserted = card_db::insert_card(
            &state.db,
            deck.id,
            &card_db::NewCard {
                front_text,
                back_text,
                position: Some(position as i64),
                ..card_db::NewCard::default()
            },
        )
        .await?;

        let mut items = card.media.clone();
        items.sort_by_key(|m| m.position);
        for item in items {
            let mut new_media = media_db::NewMedia::linked(item.media_type, item.url);
            new_media.annotations = item.annotations.unwrap_or_default();
            new_media.annotated_url = item.annotated_url;
            media_db::insert_media(&state.db, inserted.id, &new_media).await?;
        }
    }

    deck_db::refresh_card_count(&state.db, deck.id).await?;
    let deck = deck_db::load_deck(&state.db, deck.id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Imported deck {} vanished", deck.id)))?;

    info!(deck_id = %deck.id, user_id = %user.user_id, cards = cards.len(), "Imported deck");

    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            deck,
            cards_imported: cards.len(),
        }),
    ))
}

/// Build deck routes
pub fn deck_routes() -> Router<AppState> {
    Router::new()
        .route("/api/decks", get(list_my_decks).post(create_deck))
        .route("/api/decks/public", get(list_public_decks))
        .route("/api/decks/import", post(import_deck))
        .route("/api/decks/:id", get(get_deck).patch(update_deck).delete(delete_deck))
        .route("/api/decks/:id/like", post(toggle_like))
        .route("/api/decks/:id/export", get(export_deck))
}
