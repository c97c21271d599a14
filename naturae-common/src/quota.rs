//! Storage quota accounting
//!
//! Each profile carries a running `storage_used_bytes` counter. Uploads are
//! counted against the plan limit before they are stored; deleting media
//! decrements the counter.

use crate::db::{profiles, Profile};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Subscription plan of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Free,
    Pro,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Pro => "pro",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(PlanType::Free),
            "pro" => Some(PlanType::Pro),
            _ => None,
        }
    }
}

/// Byte limits per plan, configurable in the `[quota]` table
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct QuotaLimits {
    pub free_bytes: i64,
    pub pro_bytes: i64,
    /// Largest single upload accepted regardless of plan
    pub max_upload_bytes: i64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            free_bytes: 100 * 1024 * 1024,
            pro_bytes: 5 * 1024 * 1024 * 1024,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl QuotaLimits {
    pub fn limit_for(&self, plan: PlanType) -> i64 {
        match plan {
            PlanType::Free => self.free_bytes,
            PlanType::Pro => self.pro_bytes,
        }
    }
}

/// Storage usage summary shown on the settings page
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageUsage {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
    pub percent: f64,
}

impl StorageUsage {
    pub fn for_profile(profile: &Profile, limits: &QuotaLimits) -> Self {
        let limit = limits.limit_for(profile.plan_type);
        let used = profile.storage_used_bytes;
        let percent = if limit > 0 {
            ((used as f64 / limit as f64) * 1000.0).round() / 10.0
        } else {
            100.0
        };

        Self {
            used,
            limit,
            remaining: (limit - used).max(0),
            percent: percent.min(100.0),
        }
    }
}

/// Reject uploads that are empty or larger than the single-upload cap
pub fn check_size(size: i64, limits: &QuotaLimits) -> Result<()> {
    if size <= 0 {
        return Err(Error::InvalidInput("Upload is empty".to_string()));
    }
    if size > limits.max_upload_bytes {
        return Err(Error::InvalidInput(format!(
            "File is {} bytes; the maximum upload size is {} bytes",
            size, limits.max_upload_bytes
        )));
    }
    Ok(())
}

/// Check whether `size` more bytes fit in the profile's allowance
pub fn check_upload(profile: &Profile, size: i64, limits: &QuotaLimits) -> Result<()> {
    check_size(size, limits)?;

    let available = (limits.limit_for(profile.plan_type) - profile.storage_used_bytes).max(0);
    if size > available {
        return Err(Error::QuotaExceeded {
            needed: size,
            available,
        });
    }

    Ok(())
}

/// Count `size` bytes against the allowance, failing when they do not fit
///
/// The check and the increment happen in a single UPDATE. Returns the new
/// usage counter.
pub async fn reserve(pool: &SqlitePool, user_id: &str, size: i64, limits: &QuotaLimits) -> Result<i64> {
    check_size(size, limits)?;

    let reserved =
        profiles::reserve_storage(pool, user_id, size, limits.free_bytes, limits.pro_bytes).await?;
    match reserved {
        Some(used) => {
            tracing::debug!(user_id = %user_id, size, used, "Reserved storage");
            Ok(used)
        }
        None => {
            let profile = profiles::load_profile(pool, user_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Profile {}", user_id)))?;
            let available = (limits.limit_for(profile.plan_type) - profile.storage_used_bytes).max(0);
            Err(Error::QuotaExceeded {
                needed: size,
                available,
            })
        }
    }
}

/// Give `size` bytes back to the user's allowance
pub async fn release(pool: &SqlitePool, user_id: &str, size: i64) -> Result<i64> {
    if size <= 0 {
        return Ok(profiles::load_profile(pool, user_id)
            .await?
            .map_or(0, |p| p.storage_used_bytes));
    }

    let used = profiles::adjust_storage_used(pool, user_id, -size).await?;
    tracing::debug!(user_id = %user_id, size, used, "Released storage");
    Ok(used)
}
