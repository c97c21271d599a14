//! Study progress operations

use super::{format_timestamp, now_timestamp, parse_optional_timestamp, parse_uuid, Card, UserProgress};
use crate::review::{self, Rating};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

fn progress_from_row(row: &SqliteRow) -> Result<UserProgress> {
    let card_id: String = row.get("card_id");
    let last_rating: Option<String> = row.get("last_rating");

    Ok(UserProgress {
        card_id: parse_uuid(&card_id)?,
        user_id: row.get("user_id"),
        times_seen: row.get("times_seen"),
        times_correct: row.get("times_correct"),
        next_review: parse_optional_timestamp(row.get("next_review"))?,
        last_rating: last_rating.as_deref().and_then(Rating::parse),
    })
}

/// Load a user's progress on a card
pub async fn load_progress(pool: &SqlitePool, user_id: &str, card_id: Uuid) -> Result<Option<UserProgress>> {
    let row = sqlx::query(
        "SELECT card_id, user_id, times_seen, times_correct, next_review, last_rating \
         FROM user_progress WHERE user_id = ? AND card_id = ?",
    )
    .bind(user_id)
    .bind(card_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(progress_from_row).transpose()
}

/// Record one review and return the updated progress
pub async fn record_review(
    pool: &SqlitePool,
    user_id: &str,
    card_id: Uuid,
    rating: Rating,
    now: DateTime<Utc>,
) -> Result<UserProgress> {
    let previous = load_progress(pool, user_id, card_id)
        .await?
        .unwrap_or_else(|| UserProgress::unseen(card_id, user_id));

    let outcome = review::apply(previous.times_seen, previous.times_correct, rating, now);

    sqlx::query(
        r#"
        INSERT INTO user_progress (
            card_id, user_id, times_seen, times_correct, next_review, last_rating, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(card_id, user_id) DO UPDATE SET
            times_seen = excluded.times_seen,
            times_correct = excluded.times_correct,
            next_review = excluded.next_review,
            last_rating = excluded.last_rating,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(card_id.to_string())
    .bind(user_id)
    .bind(outcome.times_seen)
    .bind(outcome.times_correct)
    .bind(format_timestamp(outcome.next_review))
    .bind(rating.as_str())
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    tracing::debug!(
        card_id = %card_id,
        user_id = %user_id,
        rating = rating.as_str(),
        next_review = %outcome.next_review,
        "Recorded review"
    );

    load_progress(pool, user_id, card_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Progress for card {} vanished after upsert", card_id)))
}

/// A card in the study queue together with the user's progress on it
#[derive(Debug, Clone)]
pub struct QueuedCard {
    pub card: Card,
    pub progress: UserProgress,
    pub due: bool,
}

/// Cards of a deck in study order
///
/// Due cards come first: unseen cards in deck order, then overdue cards
/// oldest first. Cards not yet due follow in order of their next review.
pub async fn study_queue(
    pool: &SqlitePool,
    user_id: &str,
    deck_id: Uuid,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<QueuedCard>> {
    let now_str = format_timestamp(now);
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.deck_id, c.front_text, c.back_text, c.position, c.species_id,
               c.species_display,
               COALESCE(p.times_seen, 0) AS times_seen,
               COALESCE(p.times_correct, 0) AS times_correct,
               p.next_review, p.last_rating,
               (p.next_review IS NULL OR p.next_review <= ?) AS due
        FROM cards c
        LEFT JOIN user_progress p ON p.card_id = c.id AND p.user_id = ?
        WHERE c.deck_id = ?
        ORDER BY due DESC,
                 p.next_review IS NOT NULL,
                 p.next_review,
                 c.position
        LIMIT ?
        "#,
    )
    .bind(&now_str)
    .bind(user_id)
    .bind(deck_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.get("id");
            let deck: String = row.get("deck_id");
            let species_id: Option<String> = row.get("species_id");
            let last_rating: Option<String> = row.get("last_rating");
            let card_id = parse_uuid(&id)?;

            Ok(QueuedCard {
                card: Card {
                    id: card_id,
                    deck_id: parse_uuid(&deck)?,
                    front_text: row.get("front_text"),
                    back_text: row.get("back_text"),
                    position: row.get("position"),
                    species_id: species_id.as_deref().map(parse_uuid).transpose()?,
                    species_display: row.get("species_display"),
                },
                progress: UserProgress {
                    card_id,
                    user_id: user_id.to_string(),
                    times_seen: row.get("times_seen"),
                    times_correct: row.get("times_correct"),
                    next_review: parse_optional_timestamp(row.get("next_review"))?,
                    last_rating: last_rating.as_deref().and_then(Rating::parse),
                },
                due: row.get("due"),
            })
        })
        .collect()
}
