//! Deck like operations
//!
//! `decks.like_count` is updated in the same transaction as the
//! `deck_likes` row so the counter never drifts from the rows.

use super::now_timestamp;
use crate::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Outcome of a like toggle, i.e. the state the client should display
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}

/// Like the deck if the user has not, otherwise remove the like
pub async fn toggle_like(pool: &SqlitePool, user_id: &str, deck_id: Uuid) -> Result<LikeState> {
    let mut tx = pool.begin().await?;
    let deck = deck_id.to_string();

    let removed = sqlx::query("DELETE FROM deck_likes WHERE user_id = ? AND deck_id = ?")
        .bind(user_id)
        .bind(&deck)
        .execute(&mut *tx)
        .await?
        .rows_affected()
        > 0;

    let (liked, delta) = if removed {
        (false, -1)
    } else {
        sqlx::query("INSERT INTO deck_likes (user_id, deck_id, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(&deck)
            .bind(now_timestamp())
            .execute(&mut *tx)
            .await?;
        (true, 1)
    };

    let like_count: i64 = sqlx::query_scalar(
        "UPDATE decks SET like_count = MAX(0, like_count + ?) WHERE id = ? RETURNING like_count",
    )
    .bind(delta)
    .bind(&deck)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(deck_id = %deck_id, user_id = %user_id, liked, like_count, "Toggled like");

    Ok(LikeState { liked, like_count })
}

/// Whether the user currently likes the deck
pub async fn is_liked(pool: &SqlitePool, user_id: &str, deck_id: Uuid) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM deck_likes WHERE user_id = ? AND deck_id = ?")
        .bind(user_id)
        .bind(deck_id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(found.is_some())
}
