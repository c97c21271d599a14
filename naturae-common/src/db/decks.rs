//! Deck database operations
//!
//! Deleting a deck only stamps `deleted_at`; every read here filters
//! soft-deleted rows out.

use super::{now_timestamp, parse_optional_timestamp, parse_timestamp, parse_uuid, Deck};
use crate::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const DECK_COLUMNS: &str = "id, user_id, title, description, is_public, card_count, \
                            like_count, created_at, updated_at, deleted_at";

pub(crate) fn deck_from_row(row: &SqliteRow) -> Result<Deck> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Deck {
        id: parse_uuid(&id)?,
        user_id: row.get("user_id"),
        title: row.get("title"),
        description: row
            .get::<Option<String>, _>("description")
            .filter(|d| !d.is_empty()),
        is_public: row.get("is_public"),
        card_count: row.get("card_count"),
        like_count: row.get("like_count"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        deleted_at: parse_optional_timestamp(row.get("deleted_at"))?,
    })
}

/// Fields for a new deck
#[derive(Debug, Clone)]
pub struct NewDeck {
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
}

/// Partial deck update; `None` leaves a field unchanged
///
/// An empty `description` clears it.
#[derive(Debug, Clone, Default)]
pub struct DeckUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

/// Ordering for the public deck browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeckSort {
    #[default]
    Popular,
    Newest,
}

impl DeckSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "popular" => Some(DeckSort::Popular),
            "newest" => Some(DeckSort::Newest),
            _ => None,
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            DeckSort::Popular => "like_count DESC, created_at DESC",
            DeckSort::Newest => "created_at DESC",
        }
    }
}

/// Insert a deck owned by `user_id`
pub async fn create_deck(pool: &SqlitePool, user_id: &str, deck: &NewDeck) -> Result<Deck> {
    let id = Uuid::new_v4();
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO decks (id, user_id, title, description, is_public, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(user_id)
    .bind(&deck.title)
    .bind(&deck.description)
    .bind(deck.is_public)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::debug!(deck_id = %id, user_id = %user_id, "Created deck");

    load_deck(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Deck {} vanished after insert", id)))
}

/// Load a deck that has not been soft-deleted
pub async fn load_deck(pool: &SqlitePool, id: Uuid) -> Result<Option<Deck>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM decks WHERE id = ? AND deleted_at IS NULL",
        DECK_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(deck_from_row).transpose()
}

/// All live decks of a user, most recently updated first
pub async fn list_user_decks(pool: &SqlitePool, user_id: &str) -> Result<Vec<Deck>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM decks WHERE user_id = ? AND deleted_at IS NULL ORDER BY updated_at DESC",
        DECK_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(deck_from_row).collect()
}

/// Live public decks of a user (public profile page)
pub async fn list_public_decks_of_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Deck>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM decks WHERE user_id = ? AND is_public = 1 AND deleted_at IS NULL \
         ORDER BY like_count DESC, created_at DESC",
        DECK_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(deck_from_row).collect()
}

/// Escape `%`, `_` and `\` for a LIKE pattern with `ESCAPE '\'`
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

const PUBLIC_FILTER: &str = "is_public = 1 AND deleted_at IS NULL \
     AND (? IS NULL OR title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')";

/// Count live public decks matching an optional search term
pub async fn count_public_decks(pool: &SqlitePool, search: Option<&str>) -> Result<i64> {
    let pattern = search.map(like_pattern);
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM decks WHERE {}", PUBLIC_FILTER))
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// One page of live public decks matching an optional search term
pub async fn list_public_decks(
    pool: &SqlitePool,
    search: Option<&str>,
    sort: DeckSort,
    limit: i64,
    offset: i64,
) -> Result<Vec<Deck>> {
    let pattern = search.map(like_pattern);
    let rows = sqlx::query(&format!(
        "SELECT {} FROM decks WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        DECK_COLUMNS,
        PUBLIC_FILTER,
        sort.order_by()
    ))
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(deck_from_row).collect()
}

/// Apply a partial update to a live deck
pub async fn update_deck(pool: &SqlitePool, id: Uuid, update: &DeckUpdate) -> Result<Deck> {
    let result = sqlx::query(
        r#"
        UPDATE decks SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            is_public = COALESCE(?, is_public),
            updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&update.title)
    .bind(&update.description)
    .bind(update.is_public)
    .bind(now_timestamp())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Deck {}", id)));
    }

    load_deck(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Deck {}", id)))
}

/// Mark a deck deleted; returns false if it was already gone
pub async fn soft_delete_deck(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let now = now_timestamp();
    let result = sqlx::query(
        "UPDATE decks SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&now)
    .bind(&now)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Recompute `card_count` from the cards table
pub async fn refresh_card_count(pool: &SqlitePool, id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        UPDATE decks
        SET card_count = (SELECT COUNT(*) FROM cards WHERE deck_id = decks.id),
            updated_at = ?
        WHERE id = ?
        RETURNING card_count
        "#,
    )
    .bind(now_timestamp())
    .bind(id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("vogels"), "%vogels%");
        assert_eq!(like_pattern("100%_\\"), "%100\\%\\_\\\\%");
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(DeckSort::parse("newest"), Some(DeckSort::Newest));
        assert_eq!(DeckSort::parse("popular"), Some(DeckSort::Popular));
        assert_eq!(DeckSort::parse("random"), None);
    }
}
