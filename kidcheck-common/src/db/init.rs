//! Database initialization
//!
//! Creates the database on first run, applies connection pragmas, and
//! ensures all tables and default settings exist. Safe to call on every
//! startup: all schema statements are idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

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

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode allows concurrent readers with one writer; pickup attempts
    // and the retention sweep may hit the database at the same time
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    // Set busy timeout
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Schema creation (idempotent - safe to call multiple times)
    create_check_ins_table(&pool).await?;
    create_photo_purge_queue_table(&pool).await?;
    create_settings_table(&pool).await?;

    // Initialize default settings
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create the check_ins table
///
/// One row per child drop-off event. Photo references and the biometric
/// hash are nullable: they are cleared on successful pickup and by the
/// retention sweep while the row itself is retained for audit.
pub async fn create_check_ins_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS check_ins (
            id TEXT PRIMARY KEY,
            child_id TEXT NOT NULL,
            security_pin TEXT NOT NULL,
            qr_code TEXT NOT NULL UNIQUE,
            backup_auth_codes TEXT NOT NULL DEFAULT '[]',
            child_photo_ref TEXT,
            guardian_photo_ref TEXT,
            biometric_hash TEXT,
            photo_captured_at TIMESTAMP NOT NULL,
            checked_out INTEGER NOT NULL DEFAULT 0,
            checked_out_at TIMESTAMP,
            checked_out_by TEXT,
            pickup_attempts TEXT NOT NULL DEFAULT '[]',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (checked_out IN (0, 1)),
            CHECK (length(security_pin) = 6)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_check_ins_child ON check_ins(child_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_check_ins_photo_captured ON check_ins(photo_captured_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the photo_purge_queue table
///
/// Durable retention schedule: one row per check-in whose photos still
/// await expiry. Rows are removed when the purge executes or when a
/// successful pickup purges early. Survives process restarts.
pub async fn create_photo_purge_queue_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS photo_purge_queue (
            check_in_id TEXT PRIMARY KEY REFERENCES check_ins(id) ON DELETE CASCADE,
            due_at TIMESTAMP NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_photo_purge_due ON photo_purge_queue(due_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores service configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all required settings exist with default values. NULL values
/// are reset to defaults; user-modified values are left alone.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Pickup verification settings
    ensure_setting(pool, "max_pickup_attempts", "3").await?;
    ensure_setting(pool, "photo_match_threshold", "0.85").await?;

    // Photo retention settings
    ensure_setting(pool, "photo_retention_days", "7").await?;
    ensure_setting(pool, "sweep_interval_secs", "3600").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // Use INSERT OR IGNORE to handle concurrent initialization race conditions
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;

        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}
