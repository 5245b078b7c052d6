//! Domain services for check-in security

pub mod check_in_manager;
pub mod photo_match;
pub mod photo_vault;
pub mod pickup_verifier;
pub mod retention_sweeper;
pub mod secrets;

use kidcheck_common::db::settings::get_setting;
use sqlx::{Pool, Sqlite};

/// Pickup security configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Days reference photos are retained before the sweep purges them (default: 7)
    pub photo_retention_days: u32,

    /// Failed attempts before normal verification locks out (default: 3)
    pub max_pickup_attempts: usize,

    /// Minimum photo similarity score to pass the photo factor (default: 0.85)
    pub photo_match_threshold: f64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            photo_retention_days: 7,
            max_pickup_attempts: 3,
            photo_match_threshold: 0.85,
        }
    }
}

impl SecurityConfig {
    /// Load security configuration from database settings, falling back to
    /// compiled defaults for any key that is missing or unparseable
    pub async fn from_database(db: &Pool<Sqlite>) -> Self {
        let mut config = Self::default();

        if let Ok(Some(days)) = get_setting::<u32>(db, "photo_retention_days").await {
            config.photo_retention_days = days;
        }
        if let Ok(Some(max)) = get_setting::<usize>(db, "max_pickup_attempts").await {
            config.max_pickup_attempts = max;
        }
        if let Ok(Some(threshold)) = get_setting::<f64>(db, "photo_match_threshold").await {
            config.photo_match_threshold = threshold;
        }

        config
    }
}
