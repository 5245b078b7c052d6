//! Retention sweeper
//!
//! Purges photo material older than the retention window on a recurring
//! schedule, independent of any single check-in or pickup call. Records
//! themselves are retained with their audit trail; only photo references,
//! blobs, and the biometric hash are removed. A sweep racing an in-flight
//! verification is safe: the verification's photo factor fails closed once
//! the guardian reference is gone.

use crate::db::{check_ins, purge_queue};
use crate::services::photo_vault::{PhotoRef, PhotoStore};
use chrono::{Duration, Utc};
use kidcheck_common::db::settings::get_setting;
use kidcheck_common::Result;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Retention sweeper configuration
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Days reference photos are retained after capture (default: 7)
    pub retention_days: u32,

    /// Seconds between sweep runs (default: 3600)
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            retention_days: 7,
            interval_secs: 3600,
        }
    }
}

impl SweeperConfig {
    /// Load sweeper configuration from database settings, falling back to
    /// compiled defaults for any key that is missing or unparseable
    pub async fn from_database(db: &Pool<Sqlite>) -> Self {
        let mut config = Self::default();

        if let Ok(Some(days)) = get_setting::<u32>(db, "photo_retention_days").await {
            config.retention_days = days;
        }
        if let Ok(Some(secs)) = get_setting::<u64>(db, "sweep_interval_secs").await {
            config.interval_secs = secs;
        }

        config
    }
}

/// Scheduled photo retention sweep
pub struct RetentionSweeper {
    db: Pool<Sqlite>,
    vault: Arc<dyn PhotoStore>,
    config: SweeperConfig,
}

impl RetentionSweeper {
    pub fn new(db: Pool<Sqlite>, vault: Arc<dyn PhotoStore>, config: SweeperConfig) -> Self {
        Self { db, vault, config }
    }

    /// Purge photo material for every check-in whose photos were captured
    /// before the retention cutoff and which still holds at least one live
    /// reference. Returns the number of records cleaned.
    ///
    /// Idempotent: a second run over the same set purges zero.
    pub async fn cleanup_expired_photos(&self) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(self.config.retention_days as i64);
        let expired = check_ins::select_expired(&self.db, cutoff).await?;

        let mut cleaned = 0;
        for row in expired {
            for photo_ref in [
                row.child_photo_ref.as_deref(),
                row.guardian_photo_ref.as_deref(),
            ]
            .into_iter()
            .flatten()
            {
                if let Err(e) = self.vault.delete(&PhotoRef::new(photo_ref)).await {
                    warn!(
                        check_in_id = %row.id,
                        photo_ref,
                        error = %e,
                        "Failed to delete expired photo blob"
                    );
                }
            }

            // The guarded update only counts rows that still held photos,
            // so a race with a concurrent purge is not double-counted
            if check_ins::purge_photos(&self.db, &row.id).await? {
                cleaned += 1;
            }

            if let Err(e) = purge_queue::remove(&self.db, &row.id).await {
                warn!(check_in_id = %row.id, error = %e, "Failed to remove purge queue entry");
            }
        }

        if cleaned > 0 {
            info!(cleaned, "Retention sweep purged expired photo material");
        }

        Ok(cleaned)
    }

    /// Run the sweeper (spawns background task)
    ///
    /// Sweeps once per configured interval until the service is dropped.
    /// Missed ticks are skipped, not replayed.
    pub fn run(self: Arc<Self>) {
        info!(
            "Starting RetentionSweeper (interval: {}s, retention: {} days)",
            self.config.interval_secs, self.config.retention_days
        );

        tokio::spawn(async move {
            let mut timer =
                tokio::time::interval(std::time::Duration::from_secs(self.config.interval_secs));
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                timer.tick().await;

                if let Err(e) = self.cleanup_expired_photos().await {
                    error!(error = %e, "Retention sweep failed");
                }
            }
        });
    }
}
