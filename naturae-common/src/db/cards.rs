//! Card database operations

use super::{now_timestamp, parse_uuid, Card};
use crate::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const CARD_COLUMNS: &str = "id, deck_id, front_text, back_text, position, species_id, species_display";

fn card_from_row(row: &SqliteRow) -> Result<Card> {
    let id: String = row.get("id");
    let deck_id: String = row.get("deck_id");
    let species_id: Option<String> = row.get("species_id");

    Ok(Card {
        id: parse_uuid(&id)?,
        deck_id: parse_uuid(&deck_id)?,
        front_text: row.get("front_text"),
        back_text: row.get("back_text"),
        position: row.get("position"),
        species_id: species_id.as_deref().map(parse_uuid).transpose()?,
        species_display: row.get("species_display"),
    })
}

/// Fields for a new card
#[derive(Debug, Clone, Default)]
pub struct NewCard {
    pub front_text: String,
    pub back_text: String,
    /// Appended after the last card when `None`
    pub position: Option<i64>,
    pub species_id: Option<Uuid>,
    pub species_display: Option<String>,
}

/// Partial card update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct CardUpdate {
    pub front_text: Option<String>,
    pub back_text: Option<String>,
    pub species_id: Option<Uuid>,
    pub species_display: Option<String>,
}

/// Insert a card into a deck
///
/// Does not touch `decks.card_count`; callers refresh it once per batch.
pub async fn insert_card(pool: &SqlitePool, deck_id: Uuid, card: &NewCard) -> Result<Card> {
    let id = Uuid::new_v4();
    let now = now_timestamp();

    let position = match card.position {
        Some(p) => p,
        None => {
            let max: Option<i64> = sqlx::query_scalar("SELECT MAX(position) FROM cards WHERE deck_id = ?")
                .bind(deck_id.to_string())
                .fetch_one(pool)
                .await?;
            max.map_or(0, |m| m + 1)
        }
    };

    sqlx::query(
        r#"
        INSERT INTO cards (
            id, deck_id, front_text, back_text, position, species_id, species_display,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(deck_id.to_string())
    .bind(&card.front_text)
    .bind(&card.back_text)
    .bind(position)
    .bind(card.species_id.map(|s| s.to_string()))
    .bind(&card.species_display)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(Card {
        id,
        deck_id,
        front_text: card.front_text.clone(),
        back_text: card.back_text.clone(),
        position,
        species_id: card.species_id,
        species_display: card.species_display.clone(),
    })
}

/// Load a card by id
pub async fn load_card(pool: &SqlitePool, id: Uuid) -> Result<Option<Card>> {
    let row = sqlx::query(&format!("SELECT {} FROM cards WHERE id = ?", CARD_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(card_from_row).transpose()
}

/// All cards of a deck in position order
pub async fn list_cards(pool: &SqlitePool, deck_id: Uuid) -> Result<Vec<Card>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM cards WHERE deck_id = ? ORDER BY position, created_at",
        CARD_COLUMNS
    ))
    .bind(deck_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(card_from_row).collect()
}

/// Apply a partial update to a card
pub async fn update_card(pool: &SqlitePool, id: Uuid, update: &CardUpdate) -> Result<Card> {
    let result = sqlx::query(
        r#"
        UPDATE cards SET
            front_text = COALESCE(?, front_text),
            back_text = COALESCE(?, back_text),
            species_id = COALESCE(?, species_id),
            species_display = COALESCE(?, species_display),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&update.front_text)
    .bind(&update.back_text)
    .bind(update.species_id.map(|s| s.to_string()))
    .bind(&update.species_display)
    .bind(now_timestamp())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Card {}", id)));
    }

    load_card(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Card {}", id)))
}

/// Delete a card (media and progress rows cascade)
pub async fn delete_card(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cards WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Assign positions 0..n following `ordered_ids`
///
/// Every id must belong to the deck and every card of the deck must be
/// listed exactly once.
pub async fn reorder_cards(pool: &SqlitePool, deck_id: Uuid, ordered_ids: &[Uuid]) -> Result<()> {
    let current = list_cards(pool, deck_id).await?;

    let mut expected: Vec<Uuid> = current.iter().map(|c| c.id).collect();
    let mut given = ordered_ids.to_vec();
    expected.sort();
    given.sort();
    if expected != given {
        return Err(Error::InvalidInput(
            "Card order must list every card of the deck exactly once".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    let now = now_timestamp();
    for (position, id) in ordered_ids.iter().enumerate() {
        sqlx::query("UPDATE cards SET position = ?, updated_at = ? WHERE id = ? AND deck_id = ?")
            .bind(position as i64)
            .bind(&now)
            .bind(id.to_string())
            .bind(deck_id.to_string())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    Ok(())
}
