//! Database models for check-in records and their audit trail

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How a pickup attempt succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SucceededVia {
    /// Normal two-factor verification (PIN + photo match)
    Normal,
    /// Manager emergency override, no factors checked
    Override,
}

/// One evaluated pickup attempt against a check-in record.
///
/// Entries are append-only and immutable once recorded. The submitted PIN is
/// stored masked (first two digits only); the override reason, when present,
/// is stored verbatim since it is not secret material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupAttempt {
    pub timestamp: DateTime<Utc>,
    pub masked_pin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    pub success: bool,
    pub actor_id: String,
    /// Vault reference of the encrypted audit copy of the submitted photo,
    /// or a sentinel (`EMERGENCY_OVERRIDE`, `AUDIT_PHOTO_UNAVAILABLE`)
    pub photo_ref: String,
    pub succeeded_via: SucceededVia,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
}

/// One child drop-off event with its security credentials.
///
/// The record is terminal once `checked_out` is set; photo references are
/// nulled in the same transition and the row is retained for audit.
#[derive(Debug, Clone, FromRow)]
pub struct CheckInRecord {
    pub id: String,
    pub child_id: String,
    pub security_pin: String,
    pub qr_code: String,
    /// JSON array of 6-digit backup authorization codes
    pub backup_auth_codes: String,
    pub child_photo_ref: Option<String>,
    pub guardian_photo_ref: Option<String>,
    pub biometric_hash: Option<String>,
    pub photo_captured_at: DateTime<Utc>,
    pub checked_out: bool,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub checked_out_by: Option<String>,
    /// JSON array of [`PickupAttempt`] entries, append-only
    pub pickup_attempts: String,
    pub created_at: DateTime<Utc>,
}

impl CheckInRecord {
    /// Decode the audit trail from its JSON column
    pub fn attempts(&self) -> Result<Vec<PickupAttempt>> {
        Ok(serde_json::from_str(&self.pickup_attempts)?)
    }

    /// Decode the backup authorization codes from their JSON column
    pub fn backup_codes(&self) -> Result<Vec<String>> {
        Ok(serde_json::from_str(&self.backup_auth_codes)?)
    }

    /// True while at least one reference photo has not been purged
    pub fn has_live_photos(&self) -> bool {
        self.child_photo_ref.is_some() || self.guardian_photo_ref.is_some()
    }
}
