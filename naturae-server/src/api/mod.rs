//! HTTP API handlers for naturae-server

pub mod cards;
pub mod confirm;
pub mod decks;
pub mod health;
pub mod import;
pub mod media;
pub mod profile;
pub mod proxy;
pub mod species;
pub mod study;

pub use cards::card_routes;
pub use confirm::auth_routes;
pub use decks::deck_routes;
pub use health::health_routes;
pub use import::import_routes;
pub use media::media_routes;
pub use profile::profile_routes;
pub use proxy::proxy_routes;
pub use species::species_routes;
pub use study::study_routes;

use crate::clients::MediaStream;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use naturae_common::db::{cards as card_db, decks as deck_db, Card, Deck};
use uuid::Uuid;

/// Live deck the caller may read
///
/// Missing or deleted decks are 404; private decks of other users are 403.
pub(crate) async fn readable_deck(state: &AppState, id: Uuid, user_id: Option<&str>) -> ApiResult<Deck> {
    let deck = deck_db::load_deck(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Deck {}", id)))?;

    if !deck.is_readable_by(user_id) {
        tracing::warn!(deck_id = %id, user_id = ?user_id, "Rejected access to private deck");
        return Err(ApiError::Forbidden("This deck is private".to_string()));
    }

    Ok(deck)
}

/// Live deck owned by the caller
pub(crate) async fn owned_deck(state: &AppState, id: Uuid, user_id: &str) -> ApiResult<Deck> {
    let deck = deck_db::load_deck(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Deck {}", id)))?;

    if !deck.is_owned_by(user_id) {
        tracing::warn!(deck_id = %id, user_id = %user_id, "Rejected change to deck of another user");
        return Err(ApiError::Forbidden("Only the owner can change this deck".to_string()));
    }

    Ok(deck)
}

/// Card together with its live deck, which the caller must own
pub(crate) async fn owned_card(state: &AppState, card_id: Uuid, user_id: &str) -> ApiResult<(Card, Deck)> {
    let card = card_db::load_card(&state.db, card_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Card {}", card_id)))?;
    let deck = owned_deck(state, card.deck_id, user_id).await?;
    Ok((card, deck))
}

/// Pass an upstream body through to the client
pub(crate) fn stream_response(stream: MediaStream, cache_control: &'static str) -> ApiResult<Response> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, stream.content_type)
        .header(header::CACHE_CONTROL, cache_control);

    if let Some(length) = stream.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    builder
        .body(Body::from_stream(stream.response.bytes_stream()))
        .map_err(|e| ApiError::Internal(format!("Failed to build streaming response: {}", e)))
}
