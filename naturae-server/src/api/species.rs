//! Species endpoints: local records, GBIF lookup and GBIF photos

use crate::clients::gbif::GbifMedia;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use naturae_common::db::{species as species_db, Species};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

const DEFAULT_MEDIA_LIMIT: usize = 12;
const MAX_MEDIA_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GbifMediaParams {
    #[serde(rename = "taxonKey")]
    pub taxon_key: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/species/:id
pub async fn get_species(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Species>> {
    let species = species_db::load_species(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Species {}", id)))?;
    Ok(Json(species))
}

/// GET /api/species/search?q=
///
/// Matches the name on GBIF and stores the result locally.
pub async fn search_species(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Species>> {
    let name = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing query parameter q".to_string()))?;

    let matched = state
        .clients
        .gbif
        .match_species(name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No species matching '{}'", name)))?;

    let species = species_db::upsert_species(&state.db, &matched.to_species()).await?;
    info!(
        query = %name,
        species_id = %species.id,
        gbif_key = matched.key,
        "Stored species from GBIF"
    );
    Ok(Json(species))
}

/// GET /api/gbif/media?taxonKey=&limit=
pub async fn gbif_media(
    State(state): State<AppState>,
    Query(params): Query<GbifMediaParams>,
) -> ApiResult<Json<Vec<GbifMedia>>> {
    let taxon_key = params
        .taxon_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing query parameter taxonKey".to_string()))?;
    let taxon_key: i64 = taxon_key
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("taxonKey must be numeric, got '{}'", taxon_key)))?;
    let limit = params.limit.unwrap_or(DEFAULT_MEDIA_LIMIT).clamp(1, MAX_MEDIA_LIMIT);

    let media = state.clients.gbif.occurrence_media(taxon_key, limit).await?;
    Ok(Json(media))
}

/// Build species routes
pub fn species_routes() -> Router<AppState> {
    Router::new()
        .route("/api/species/search", get(search_species))
        .route("/api/species/:id", get(get_species))
        .route("/api/gbif/media", get(gbif_media))
}
