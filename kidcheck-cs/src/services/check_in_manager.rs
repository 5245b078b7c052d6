//! Check-In Record Manager
//!
//! Turns two captured photos plus a child identifier into a persisted,
//! securely-keyed check-in record. The returned PIN and QR token are the
//! pickup credentials and must be communicated to the guardian out-of-band
//! (printed on a receipt); the system never re-derives them.

use crate::db::{check_ins, purge_queue};
use crate::services::photo_vault::{PhotoRef, PhotoStore};
use crate::services::{secrets, SecurityConfig};
use chrono::{Duration, Utc};
use kidcheck_common::db::models::CheckInRecord;
use kidcheck_common::{Error, Result};
use sha2::{Digest, Sha256};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const BACKUP_CODE_COUNT: usize = 3;

/// Pickup credentials returned to the caller at drop-off
#[derive(Debug, Clone)]
pub struct CheckInReceipt {
    pub check_in_id: Uuid,
    pub security_pin: String,
    pub qr_code: String,
}

/// Creates check-in records and owns their purge scheduling
pub struct CheckInManager {
    db: Pool<Sqlite>,
    vault: Arc<dyn PhotoStore>,
    config: SecurityConfig,
}

impl CheckInManager {
    pub fn new(db: Pool<Sqlite>, vault: Arc<dyn PhotoStore>, config: SecurityConfig) -> Self {
        Self { db, vault, config }
    }

    /// Process a drop-off: generate credentials, encrypt and store both
    /// photos, persist the record, and schedule the retention purge.
    pub async fn create_check_in(
        &self,
        child_photo: &[u8],
        guardian_photo: &[u8],
        child_id: &str,
    ) -> Result<CheckInReceipt> {
        if child_id.trim().is_empty() {
            return Err(Error::InvalidInput("Blank child identifier".to_string()));
        }
        if child_photo.is_empty() || guardian_photo.is_empty() {
            return Err(Error::InvalidInput("Empty photo payload".to_string()));
        }

        // Generate security elements
        let security_pin = secrets::generate_security_pin();
        let qr_code = secrets::generate_qr_token();
        let backup_codes = secrets::generate_backup_codes(BACKUP_CODE_COUNT);

        // Encrypt and store photos
        let child_ref = self.vault.store(child_photo, "child").await?;
        let guardian_ref = match self.vault.store(guardian_photo, "guardian").await {
            Ok(r) => r,
            Err(e) => {
                self.discard_photo(&child_ref).await;
                return Err(e);
            }
        };

        let biometric_hash = format!("{:x}", Sha256::digest(guardian_photo));
        let check_in_id = Uuid::new_v4();
        let photo_captured_at = Utc::now();

        let record = CheckInRecord {
            id: check_in_id.to_string(),
            child_id: child_id.to_string(),
            security_pin: security_pin.clone(),
            qr_code: qr_code.clone(),
            backup_auth_codes: serde_json::to_string(&backup_codes)?,
            child_photo_ref: Some(child_ref.as_str().to_string()),
            guardian_photo_ref: Some(guardian_ref.as_str().to_string()),
            biometric_hash: Some(biometric_hash),
            photo_captured_at,
            checked_out: false,
            checked_out_at: None,
            checked_out_by: None,
            pickup_attempts: "[]".to_string(),
            created_at: photo_captured_at,
        };

        if let Err(e) = check_ins::insert_check_in(&self.db, &record).await {
            // Stored photos must not outlive a record that was never persisted
            self.discard_photo(&child_ref).await;
            self.discard_photo(&guardian_ref).await;
            return Err(e);
        }

        // Durable purge schedule: photos expire no later than the retention
        // window after capture, regardless of process restarts
        let due_at = photo_captured_at + Duration::days(self.config.photo_retention_days as i64);
        if let Err(e) = purge_queue::enqueue(&self.db, &record.id, due_at).await {
            check_ins::delete_check_in(&self.db, &record.id).await.ok();
            self.discard_photo(&child_ref).await;
            self.discard_photo(&guardian_ref).await;
            return Err(e);
        }

        info!(
            check_in_id = %check_in_id,
            child_id,
            purge_due_at = %due_at,
            "Check-in created"
        );

        Ok(CheckInReceipt {
            check_in_id,
            security_pin,
            qr_code,
        })
    }

    async fn discard_photo(&self, photo_ref: &PhotoRef) {
        if let Err(e) = self.vault.delete(photo_ref).await {
            warn!(photo_ref = %photo_ref, error = %e, "Failed to discard stored photo");
        }
    }
}
