//! Database initialization
//!
//! Creates the database file and every table on first run. All statements
//! are idempotent so the service can call this on each startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_connection(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

/// Connect to an in-memory database with the full schema (tests, tooling)
pub async fn init_memory_database() -> Result<SqlitePool> {
    // Single connection: every pooled connection to :memory: is a new database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

async fn configure_connection(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;
    Ok(())
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_profiles_table(pool).await?;
    create_decks_table(pool).await?;
    create_species_table(pool).await?;
    create_cards_table(pool).await?;
    create_card_media_table(pool).await?;
    create_deck_likes_table(pool).await?;
    create_user_progress_table(pool).await?;
    Ok(())
}

async fn create_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            user_id TEXT PRIMARY KEY,
            email TEXT,
            username TEXT UNIQUE,
            display_name TEXT,
            avatar_url TEXT,
            storage_used_bytes INTEGER NOT NULL DEFAULT 0 CHECK (storage_used_bytes >= 0),
            plan_type TEXT NOT NULL DEFAULT 'free' CHECK (plan_type IN ('free', 'pro')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_decks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS decks (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES profiles(user_id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            description TEXT,
            is_public INTEGER NOT NULL DEFAULT 0,
            card_count INTEGER NOT NULL DEFAULT 0,
            like_count INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_decks_user ON decks(user_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_decks_public ON decks(is_public, deleted_at, like_count)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_species_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS species (
            id TEXT PRIMARY KEY,
            scientific_name TEXT NOT NULL UNIQUE,
            canonical_name TEXT,
            common_names TEXT NOT NULL DEFAULT '{}',
            taxonomy TEXT NOT NULL DEFAULT '{}',
            gbif_key INTEGER UNIQUE,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cards_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cards (
            id TEXT PRIMARY KEY,
            deck_id TEXT NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
            front_text TEXT NOT NULL,
            back_text TEXT NOT NULL DEFAULT '',
            position INTEGER NOT NULL,
            species_id TEXT REFERENCES species(id) ON DELETE SET NULL,
            species_display TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cards_deck ON cards(deck_id, position)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_card_media_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS card_media (
            id TEXT PRIMARY KEY,
            card_id TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
            type TEXT NOT NULL CHECK (type IN ('image', 'audio')),
            url TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            annotations TEXT,
            annotated_url TEXT,
            size_bytes INTEGER NOT NULL DEFAULT 0,
            storage_path TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_card_media_card ON card_media(card_id, position)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_deck_likes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS deck_likes (
            user_id TEXT NOT NULL REFERENCES profiles(user_id) ON DELETE CASCADE,
            deck_id TEXT NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            PRIMARY KEY (user_id, deck_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_progress (
            card_id TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES profiles(user_id) ON DELETE CASCADE,
            times_seen INTEGER NOT NULL DEFAULT 0,
            times_correct INTEGER NOT NULL DEFAULT 0,
            next_review TEXT,
            last_rating TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (card_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
