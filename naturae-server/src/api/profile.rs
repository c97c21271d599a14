//! Profile endpoints

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use naturae_common::db::{decks as deck_db, profiles, Deck, Profile};
use naturae_common::quota::StorageUsage;
use naturae_common::text;
use serde::{Deserialize, Serialize};
use tracing::info;

const MAX_AVATAR_URL_CHARS: usize = 500;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
    pub storage: StorageUsage,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// What other users see of a profile
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decks: Vec<Deck>,
}

fn validate_avatar_url(url: &str) -> ApiResult<String> {
    let url = url.trim();
    if url.chars().count() > MAX_AVATAR_URL_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Avatar URL must be at most {} characters",
            MAX_AVATAR_URL_CHARS
        )));
    }
    if !(url.is_empty() || url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/')) {
        return Err(ApiError::BadRequest("Avatar URL must be an http(s) URL".to_string()));
    }
    Ok(url.to_string())
}

async fn own_profile(state: &AppState, user: &AuthUser) -> ApiResult<ProfileResponse> {
    let profile = profiles::load_profile(&state.db, &user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Profile {}", user.user_id)))?;
    let storage = StorageUsage::for_profile(&profile, &state.settings.quota);
    Ok(ProfileResponse { profile, storage })
}

/// GET /api/profile
pub async fn get_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<ProfileResponse>> {
    Ok(Json(own_profile(&state, &user).await?))
}

/// PATCH /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let update = profiles::ProfileUpdate {
        username: request.username.as_deref().map(text::validate_username).transpose()?,
        display_name: request
            .display_name
            .as_deref()
            .map(text::validate_display_name)
            .transpose()?,
        avatar_url: request.avatar_url.as_deref().map(validate_avatar_url).transpose()?,
    };

    profiles::update_profile(&state.db, &user.user_id, &update).await?;
    info!(
        user_id = %user.user_id,
        username = ?update.username,
        "Updated profile"
    );

    Ok(Json(own_profile(&state, &user).await?))
}

/// GET /api/profiles/:username
pub async fn get_public_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<PublicProfile>> {
    let username = username.trim().to_lowercase();
    let profile = profiles::load_profile_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", username)))?;
    let decks = deck_db::list_public_decks_of_user(&state.db, &profile.user_id).await?;

    Ok(Json(PublicProfile {
        username,
        display_name: profile.display_name.filter(|n| !n.is_empty()),
        avatar_url: profile.avatar_url.filter(|u| !u.is_empty()),
        created_at: profile.created_at,
        decks,
    }))
}

/// Build profile routes
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/api/profile", get(get_profile).patch(update_profile))
        .route("/api/profiles/:username", get(get_public_profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_url_validation() {
        assert_eq!(validate_avatar_url(" https://example.com/a.png ").unwrap(), "https://example.com/a.png");
        assert_eq!(validate_avatar_url("").unwrap(), "");
        assert!(validate_avatar_url("javascript:alert(1)").is_err());
        assert!(validate_avatar_url(&format!("https://{}", "a".repeat(600))).is_err());
    }
}
