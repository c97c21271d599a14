//! Species database operations

use super::{now_timestamp, parse_uuid, Species, Taxonomy};
use crate::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

const SPECIES_COLUMNS: &str = "id, scientific_name, canonical_name, common_names, taxonomy, gbif_key";

fn species_from_row(row: &SqliteRow) -> Result<Species> {
    let id: String = row.get("id");
    let common_names: String = row.get("common_names");
    let taxonomy: String = row.get("taxonomy");

    Ok(Species {
        id: parse_uuid(&id)?,
        scientific_name: row.get("scientific_name"),
        canonical_name: row.get("canonical_name"),
        common_names: serde_json::from_str::<BTreeMap<String, String>>(&common_names)?,
        taxonomy: serde_json::from_str::<Taxonomy>(&taxonomy)?,
        gbif_key: row.get("gbif_key"),
    })
}

/// Load species by id
pub async fn load_species(pool: &SqlitePool, id: Uuid) -> Result<Option<Species>> {
    let row = sqlx::query(&format!("SELECT {} FROM species WHERE id = ?", SPECIES_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(species_from_row).transpose()
}

/// Find species by scientific or canonical name (case-insensitive)
pub async fn find_by_scientific_name(pool: &SqlitePool, name: &str) -> Result<Option<Species>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM species \
         WHERE scientific_name = ?1 COLLATE NOCASE OR canonical_name = ?1 COLLATE NOCASE \
         LIMIT 1",
        SPECIES_COLUMNS
    ))
    .bind(name.trim())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(species_from_row).transpose()
}

/// Insert a species, or refresh the existing row with the same scientific name
///
/// Common names are merged: names already stored for other languages are kept.
/// Returns the stored row, whose id may differ from `species.id`.
pub async fn upsert_species(pool: &SqlitePool, species: &Species) -> Result<Species> {
    let mut common_names = species.common_names.clone();
    if let Some(existing) = find_by_scientific_name(pool, &species.scientific_name).await? {
        for (lang, name) in existing.common_names {
            common_names.entry(lang).or_insert(name);
        }
    }

    let row = sqlx::query(
        r#"
        INSERT INTO species (
            id, scientific_name, canonical_name, common_names, taxonomy, gbif_key, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(scientific_name) DO UPDATE SET
            canonical_name = COALESCE(excluded.canonical_name, species.canonical_name),
            common_names = excluded.common_names,
            taxonomy = CASE WHEN excluded.taxonomy = '{}' THEN species.taxonomy ELSE excluded.taxonomy END,
            gbif_key = COALESCE(excluded.gbif_key, species.gbif_key)
        RETURNING id
        "#,
    )
    .bind(species.id.to_string())
    .bind(&species.scientific_name)
    .bind(&species.canonical_name)
    .bind(serde_json::to_string(&common_names)?)
    .bind(serde_json::to_string(&species.taxonomy)?)
    .bind(species.gbif_key)
    .bind(now_timestamp())
    .fetch_one(pool)
    .await?;

    let id: String = row.get("id");
    let id = parse_uuid(&id)?;

    tracing::debug!(species_id = %id, name = %species.scientific_name, "Upserted species");

    load_species(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Species {} vanished after upsert", id)))
}
