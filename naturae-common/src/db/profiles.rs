//! Profile database operations

use super::{now_timestamp, parse_timestamp, Profile};
use crate::quota::PlanType;
use crate::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

const PROFILE_COLUMNS: &str = "user_id, email, username, display_name, avatar_url, \
                               storage_used_bytes, plan_type, created_at";

fn profile_from_row(row: &SqliteRow) -> Result<Profile> {
    let plan: String = row.get("plan_type");
    let created_at: String = row.get("created_at");

    Ok(Profile {
        user_id: row.get("user_id"),
        email: row.get("email"),
        username: row.get("username"),
        display_name: row.get("display_name"),
        avatar_url: row.get("avatar_url"),
        storage_used_bytes: row.get("storage_used_bytes"),
        plan_type: PlanType::parse(&plan)
            .ok_or_else(|| Error::Internal(format!("Unknown plan type: {}", plan)))?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Create the profile row for a user on first sign-in, returning it
pub async fn ensure_profile(pool: &SqlitePool, user_id: &str, email: Option<&str>) -> Result<Profile> {
    let now = now_timestamp();
    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, email, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            email = COALESCE(excluded.email, profiles.email)
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    load_profile(pool, user_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("Profile {} vanished after insert", user_id)))
}

/// Load profile by user id
pub async fn load_profile(pool: &SqlitePool, user_id: &str) -> Result<Option<Profile>> {
    let row = sqlx::query(&format!("SELECT {} FROM profiles WHERE user_id = ?", PROFILE_COLUMNS))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(profile_from_row).transpose()
}

/// Load profile by its public username
pub async fn load_profile_by_username(pool: &SqlitePool, username: &str) -> Result<Option<Profile>> {
    let row = sqlx::query(&format!("SELECT {} FROM profiles WHERE username = ?", PROFILE_COLUMNS))
        .bind(username)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(profile_from_row).transpose()
}

/// Fields a user may change on the settings page; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Apply a profile update
///
/// Returns `Error::Conflict` when the username is taken by another user.
pub async fn update_profile(pool: &SqlitePool, user_id: &str, update: &ProfileUpdate) -> Result<Profile> {
    let result = sqlx::query(
        r#"
        UPDATE profiles SET
            username = COALESCE(?, username),
            display_name = COALESCE(?, display_name),
            avatar_url = COALESCE(?, avatar_url),
            updated_at = ?
        WHERE user_id = ?
        "#,
    )
    .bind(&update.username)
    .bind(&update.display_name)
    .bind(&update.avatar_url)
    .bind(now_timestamp())
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(Error::from)
    .map_err(|e| {
        if e.is_unique_violation() {
            Error::Conflict("Username is already taken".to_string())
        } else {
            e
        }
    })?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Profile {}", user_id)));
    }

    load_profile(pool, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Profile {}", user_id)))
}

/// Add `size` bytes to the storage counter only if the result stays within
/// the limit of the profile's plan
///
/// The limit check and the increment are one statement, so concurrent
/// reservations cannot both pass against the same old counter. Returns
/// `None` when the bytes do not fit or the profile does not exist.
pub async fn reserve_storage(
    pool: &SqlitePool,
    user_id: &str,
    size: i64,
    free_limit: i64,
    pro_limit: i64,
) -> Result<Option<i64>> {
    let row = sqlx::query(
        r#"
        UPDATE profiles
        SET storage_used_bytes = storage_used_bytes + ?, updated_at = ?
        WHERE user_id = ?
          AND storage_used_bytes + ? <= CASE plan_type WHEN 'pro' THEN ? ELSE ? END
        RETURNING storage_used_bytes
        "#,
    )
    .bind(size)
    .bind(now_timestamp())
    .bind(user_id)
    .bind(size)
    .bind(pro_limit)
    .bind(free_limit)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| row.get("storage_used_bytes")))
}

/// Add `delta` bytes (negative to subtract) to the user's storage counter
///
/// The counter never drops below zero. Returns the new value.
pub async fn adjust_storage_used(pool: &SqlitePool, user_id: &str, delta: i64) -> Result<i64> {
    let row = sqlx::query(
        r#"
        UPDATE profiles
        SET storage_used_bytes = MAX(0, storage_used_bytes + ?), updated_at = ?
        WHERE user_id = ?
        RETURNING storage_used_bytes
        "#,
    )
    .bind(delta)
    .bind(now_timestamp())
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(row.get("storage_used_bytes")),
        None => Err(Error::NotFound(format!("Profile {}", user_id))),
    }
}

/// Change the user's plan
pub async fn set_plan(pool: &SqlitePool, user_id: &str, plan: PlanType) -> Result<()> {
    sqlx::query("UPDATE profiles SET plan_type = ?, updated_at = ? WHERE user_id = ?")
        .bind(plan.as_str())
        .bind(now_timestamp())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
