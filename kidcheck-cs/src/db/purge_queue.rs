//! Photo purge queue queries
//!
//! The queue is the durable counterpart of the retention window: one row
//! per check-in whose photos still await expiry, keyed by record id with
//! the purge due time. Rows outlive process restarts; the retention
//! sweeper drains them.

use chrono::{DateTime, Utc};
use kidcheck_common::Result;
use sqlx::{Pool, Sqlite};

/// Schedule a purge for a check-in's photos
pub async fn enqueue(db: &Pool<Sqlite>, check_in_id: &str, due_at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO photo_purge_queue (check_in_id, due_at)
        VALUES (?, ?)
        ON CONFLICT(check_in_id) DO UPDATE SET due_at = excluded.due_at
        "#,
    )
    .bind(check_in_id)
    .bind(due_at)
    .execute(db)
    .await?;

    Ok(())
}

/// Remove a check-in's purge entry (photos already purged or checked out)
pub async fn remove(db: &Pool<Sqlite>, check_in_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM photo_purge_queue WHERE check_in_id = ?")
        .bind(check_in_id)
        .execute(db)
        .await?;

    Ok(())
}
