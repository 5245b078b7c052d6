//! Tests for database initialization and default settings

use kidcheck_common::db::init::init_database;
use kidcheck_common::db::settings::{get_setting, set_setting};
use tempfile::TempDir;

#[tokio::test]
async fn database_is_created_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("kidcheck.db");
    assert!(!db_path.exists());

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    // All tables exist
    for table in ["check_ins", "photo_purge_queue", "settings"] {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(found, "table {} missing", table);
    }
}

#[tokio::test]
async fn default_settings_are_initialized() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("kidcheck.db")).await.unwrap();

    assert_eq!(
        get_setting::<u32>(&pool, "max_pickup_attempts").await.unwrap(),
        Some(3)
    );
    assert_eq!(
        get_setting::<f64>(&pool, "photo_match_threshold").await.unwrap(),
        Some(0.85)
    );
    assert_eq!(
        get_setting::<u32>(&pool, "photo_retention_days").await.unwrap(),
        Some(7)
    );
    assert_eq!(
        get_setting::<u64>(&pool, "sweep_interval_secs").await.unwrap(),
        Some(3600)
    );
}

#[tokio::test]
async fn reinit_preserves_modified_settings() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("kidcheck.db");

    let pool = init_database(&db_path).await.unwrap();
    set_setting(&pool, "photo_retention_days", 14).await.unwrap();
    pool.close().await;

    // Second startup must not clobber the operator's value
    let pool = init_database(&db_path).await.unwrap();
    assert_eq!(
        get_setting::<u32>(&pool, "photo_retention_days").await.unwrap(),
        Some(14)
    );
}

#[tokio::test]
async fn null_setting_is_reset_to_default() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("kidcheck.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = NULL WHERE key = 'max_pickup_attempts'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    assert_eq!(
        get_setting::<u32>(&pool, "max_pickup_attempts").await.unwrap(),
        Some(3)
    );
}
