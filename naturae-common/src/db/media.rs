//! Card media database operations

use super::{now_timestamp, parse_uuid, CardMedia, MediaType};
use crate::annotations::{self, Annotation};
use crate::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

const MEDIA_COLUMNS: &str =
    "id, card_id, type, url, position, annotations, annotated_url, size_bytes, storage_path";

fn media_from_row(row: &SqliteRow) -> Result<CardMedia> {
    let id: String = row.get("id");
    let card_id: String = row.get("card_id");
    let media_type: String = row.get("type");
    let annotations: Option<String> = row.get("annotations");

    Ok(CardMedia {
        id: parse_uuid(&id)?,
        card_id: parse_uuid(&card_id)?,
        media_type: MediaType::parse(&media_type)
            .ok_or_else(|| Error::Internal(format!("Unknown media type: {}", media_type)))?,
        url: row.get("url"),
        position: row.get("position"),
        annotations: annotations::from_json(annotations.as_deref())?,
        annotated_url: row.get("annotated_url"),
        size_bytes: row.get("size_bytes"),
        storage_path: row.get("storage_path"),
    })
}

/// Fields for a new media row
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub media_type: MediaType,
    pub url: String,
    /// Appended after the card's last media item when `None`
    pub position: Option<i64>,
    pub annotations: Vec<Annotation>,
    pub annotated_url: Option<String>,
    pub size_bytes: i64,
    /// Path relative to the media folder, for uploads stored locally
    pub storage_path: Option<String>,
}

impl NewMedia {
    /// Media referenced by URL only (imports, external sources)
    pub fn linked(media_type: MediaType, url: String) -> Self {
        Self {
            media_type,
            url,
            position: None,
            annotations: Vec::new(),
            annotated_url: None,
            size_bytes: 0,
            storage_path: None,
        }
    }
}

/// Attach media to a card
pub async fn insert_media(pool: &SqlitePool, card_id: Uuid, media: &NewMedia) -> Result<CardMedia> {
    let id = Uuid::new_v4();

    let position = match media.position {
        Some(p) => p,
        None => {
            let max: Option<i64> =
                sqlx::query_scalar("SELECT MAX(position) FROM card_media WHERE card_id = ?")
                    .bind(card_id.to_string())
                    .fetch_one(pool)
                    .await?;
            max.map_or(0, |m| m + 1)
        }
    };

    let annotations_json = if media.annotations.is_empty() {
        None
    } else {
        Some(annotations::to_json(&media.annotations)?)
    };

    sqlx::query(
        r#"
        INSERT INTO card_media (
            id, card_id, type, url, position, annotations, annotated_url,
            size_bytes, storage_path, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(card_id.to_string())
    .bind(media.media_type.as_str())
    .bind(&media.url)
    .bind(position)
    .bind(&annotations_json)
    .bind(&media.annotated_url)
    .bind(media.size_bytes)
    .bind(&media.storage_path)
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    Ok(CardMedia {
        id,
        card_id,
        media_type: media.media_type,
        url: media.url.clone(),
        position,
        annotations: media.annotations.clone(),
        annotated_url: media.annotated_url.clone(),
        size_bytes: media.size_bytes,
        storage_path: media.storage_path.clone(),
    })
}

/// Load one media row
pub async fn load_media(pool: &SqlitePool, id: Uuid) -> Result<Option<CardMedia>> {
    let row = sqlx::query(&format!("SELECT {} FROM card_media WHERE id = ?", MEDIA_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(media_from_row).transpose()
}

/// Media of every card in a deck, grouped by card id, each list in position order
pub async fn list_media_for_deck(pool: &SqlitePool, deck_id: Uuid) -> Result<HashMap<Uuid, Vec<CardMedia>>> {
    let rows = sqlx::query(
        r#"
        SELECT m.id, m.card_id, m.type, m.url, m.position, m.annotations, m.annotated_url,
               m.size_bytes, m.storage_path
        FROM card_media m
        JOIN cards c ON c.id = m.card_id
        WHERE c.deck_id = ?
        ORDER BY m.card_id, m.position
        "#,
    )
    .bind(deck_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<CardMedia>> = HashMap::new();
    for row in &rows {
        let media = media_from_row(row)?;
        grouped.entry(media.card_id).or_default().push(media);
    }
    Ok(grouped)
}

/// Media of a single card in position order
pub async fn list_media_for_card(pool: &SqlitePool, card_id: Uuid) -> Result<Vec<CardMedia>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM card_media WHERE card_id = ? ORDER BY position",
        MEDIA_COLUMNS
    ))
    .bind(card_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(media_from_row).collect()
}

/// Replace the annotation overlay of an image
pub async fn update_annotations(
    pool: &SqlitePool,
    id: Uuid,
    items: &[Annotation],
    annotated_url: Option<&str>,
) -> Result<CardMedia> {
    let json = if items.is_empty() {
        None
    } else {
        Some(annotations::to_json(items)?)
    };

    let result = sqlx::query("UPDATE card_media SET annotations = ?, annotated_url = ? WHERE id = ?")
        .bind(&json)
        .bind(annotated_url)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Media {}", id)));
    }

    load_media(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Media {}", id)))
}

/// Delete a media row
pub async fn delete_media(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM card_media WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Locally stored files and their sizes for all media of a card
///
/// Used before deleting a card so the files and quota can be released.
pub async fn stored_files_for_card(pool: &SqlitePool, card_id: Uuid) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query(
        "SELECT storage_path, size_bytes FROM card_media WHERE card_id = ? AND storage_path IS NOT NULL",
    )
    .bind(card_id.to_string())
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get("storage_path"), row.get("size_bytes")))
        .collect())
}

/// Number of media rows still pointing at a stored file
///
/// Identical uploads share one file, so a file may only be removed once
/// this drops to zero.
pub async fn count_storage_references(pool: &SqlitePool, storage_path: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM card_media WHERE storage_path = ?")
        .bind(storage_path)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
