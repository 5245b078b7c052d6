//! Check-in record queries
//!
//! All writes that decide a pickup outcome are conditional updates guarded
//! on the row's current `checked_out` flag and attempt count. Two concurrent
//! attempts therefore cannot both be admitted past the lockout threshold or
//! both check out the same child: exactly one guarded write commits, the
//! loser sees zero affected rows.

use chrono::{DateTime, Utc};
use kidcheck_common::db::models::CheckInRecord;
use kidcheck_common::Result;
use sqlx::{Pool, Sqlite};

/// Insert a freshly created check-in record
pub async fn insert_check_in(db: &Pool<Sqlite>, record: &CheckInRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO check_ins (
            id, child_id, security_pin, qr_code, backup_auth_codes,
            child_photo_ref, guardian_photo_ref, biometric_hash,
            photo_captured_at, checked_out, pickup_attempts
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.child_id)
    .bind(&record.security_pin)
    .bind(&record.qr_code)
    .bind(&record.backup_auth_codes)
    .bind(&record.child_photo_ref)
    .bind(&record.guardian_photo_ref)
    .bind(&record.biometric_hash)
    .bind(record.photo_captured_at)
    .bind(&record.pickup_attempts)
    .execute(db)
    .await?;

    Ok(())
}

/// Fetch a check-in record by id
pub async fn get_check_in(db: &Pool<Sqlite>, check_in_id: &str) -> Result<Option<CheckInRecord>> {
    let record = sqlx::query_as::<_, CheckInRecord>(
        r#"
        SELECT id, child_id, security_pin, qr_code, backup_auth_codes,
               child_photo_ref, guardian_photo_ref, biometric_hash,
               photo_captured_at, checked_out, checked_out_at, checked_out_by,
               pickup_attempts, created_at
        FROM check_ins
        WHERE id = ?
        "#,
    )
    .bind(check_in_id)
    .fetch_optional(db)
    .await?;

    Ok(record)
}

/// Delete a check-in record outright (rollback of a partially created one)
pub async fn delete_check_in(db: &Pool<Sqlite>, check_in_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM check_ins WHERE id = ?")
        .bind(check_in_id)
        .execute(db)
        .await?;

    Ok(())
}

/// Record a failed pickup attempt.
///
/// Guarded on the attempt count observed when the attempt was evaluated;
/// returns false when a concurrent writer got there first.
pub async fn record_attempt(
    db: &Pool<Sqlite>,
    check_in_id: &str,
    expected_attempts: i64,
    attempts_json: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE check_ins
        SET pickup_attempts = ?
        WHERE id = ?
          AND checked_out = 0
          AND json_array_length(pickup_attempts) = ?
        "#,
    )
    .bind(attempts_json)
    .bind(check_in_id)
    .bind(expected_attempts)
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record a successful checkout: appends the attempt, marks the record
/// terminal, and clears photo material in the same guarded write.
///
/// Returns false when a concurrent writer got there first.
pub async fn record_checkout(
    db: &Pool<Sqlite>,
    check_in_id: &str,
    expected_attempts: i64,
    attempts_json: &str,
    checked_out_by: &str,
    checked_out_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE check_ins
        SET pickup_attempts = ?,
            checked_out = 1,
            checked_out_at = ?,
            checked_out_by = ?,
            child_photo_ref = NULL,
            guardian_photo_ref = NULL,
            biometric_hash = NULL
        WHERE id = ?
          AND checked_out = 0
          AND json_array_length(pickup_attempts) = ?
        "#,
    )
    .bind(attempts_json)
    .bind(checked_out_at)
    .bind(checked_out_by)
    .bind(check_in_id)
    .bind(expected_attempts)
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Null out photo references and the biometric hash, keeping the record
/// and its audit trail. Returns false if the photos were already purged.
pub async fn purge_photos(db: &Pool<Sqlite>, check_in_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE check_ins
        SET child_photo_ref = NULL,
            guardian_photo_ref = NULL,
            biometric_hash = NULL
        WHERE id = ?
          AND (child_photo_ref IS NOT NULL OR guardian_photo_ref IS NOT NULL)
        "#,
    )
    .bind(check_in_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Row subset returned by [`select_expired`]
#[derive(Debug, sqlx::FromRow)]
pub struct ExpiredPhotos {
    pub id: String,
    pub child_photo_ref: Option<String>,
    pub guardian_photo_ref: Option<String>,
}

/// Check-ins whose photos were captured before the cutoff and which still
/// hold at least one live photo reference
pub async fn select_expired(
    db: &Pool<Sqlite>,
    cutoff: DateTime<Utc>,
) -> Result<Vec<ExpiredPhotos>> {
    let rows = sqlx::query_as::<_, ExpiredPhotos>(
        r#"
        SELECT id, child_photo_ref, guardian_photo_ref
        FROM check_ins
        WHERE photo_captured_at < ?
          AND (child_photo_ref IS NOT NULL OR guardian_photo_ref IS NOT NULL)
        "#,
    )
    .bind(cutoff)
    .fetch_all(db)
    .await?;

    Ok(rows)
}
