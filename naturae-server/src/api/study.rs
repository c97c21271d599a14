//! Study endpoints: the review queue of a deck and recording answers

use super::readable_deck;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use naturae_common::db::{cards as card_db, media as media_db, progress, Card, CardMedia, UserProgress};
use naturae_common::review::Rating;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

const DEFAULT_QUEUE_LIMIT: i64 = 50;
const MAX_QUEUE_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct StudyParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: String,
}

#[derive(Debug, Serialize)]
pub struct StudyCard {
    #[serde(flatten)]
    pub card: Card,
    pub media: Vec<CardMedia>,
    pub progress: UserProgress,
    pub due: bool,
}

#[derive(Debug, Serialize)]
pub struct StudySession {
    pub deck_id: Uuid,
    pub due_count: usize,
    pub cards: Vec<StudyCard>,
}

/// GET /api/decks/:id/study?limit=
pub async fn study_queue(
    State(state): State<AppState>,
    user: AuthUser,
    Path(deck_id): Path<Uuid>,
    Query(params): Query<StudyParams>,
) -> ApiResult<Json<StudySession>> {
    readable_deck(&state, deck_id, Some(&user.user_id)).await?;

    let limit = params.limit.unwrap_or(DEFAULT_QUEUE_LIMIT).clamp(1, MAX_QUEUE_LIMIT);
    let queue = progress::study_queue(&state.db, &user.user_id, deck_id, Utc::now(), limit).await?;
    let mut media = media_db::list_media_for_deck(&state.db, deck_id).await?;

    let cards: Vec<StudyCard> = queue
        .into_iter()
        .map(|queued| StudyCard {
            media: media.remove(&queued.card.id).unwrap_or_default(),
            card: queued.card,
            progress: queued.progress,
            due: queued.due,
        })
        .collect();
    let due_count = cards.iter().filter(|c| c.due).count();

    info!(deck_id = %deck_id, user_id = %user.user_id, cards = cards.len(), due = due_count, "Built study queue");
    Ok(Json(StudySession {
        deck_id,
        due_count,
        cards,
    }))
}

/// POST /api/cards/:id/review
pub async fn review_card(
    State(state): State<AppState>,
    user: AuthUser,
    Path(card_id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<Json<UserProgress>> {
    let rating = Rating::parse(&request.rating).ok_or_else(|| {
        ApiError::BadRequest(format!("Unknown rating '{}', use again, hard, good or easy", request.rating))
    })?;

    let card = card_db::load_card(&state.db, card_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Card {}", card_id)))?;
    readable_deck(&state, card.deck_id, Some(&user.user_id)).await?;

    let progress = progress::record_review(&state.db, &user.user_id, card_id, rating, Utc::now()).await?;

    info!(
        card_id = %card_id,
        user_id = %user.user_id,
        rating = rating.as_str(),
        times_seen = progress.times_seen,
        "Recorded review"
    );
    Ok(Json(progress))
}

/// Build study routes
pub fn study_routes() -> Router<AppState> {
    Router::new()
        .route("/api/decks/:id/study", get(study_queue))
        .route("/api/cards/:id/review", post(review_card))
}
