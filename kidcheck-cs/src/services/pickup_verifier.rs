//! Pickup Verification Engine
//!
//! Decides, per attempt, whether a person presenting a photo and a PIN may
//! take custody of a specific child, and maintains the audit/lockout state
//! that governs repeated attempts.
//!
//! Per record the pickup lifecycle is: awaiting pickup, then one of checked
//! out (successful verification), locked (attempts exhausted, only the
//! manager override is accepted), or overridden. Checked-out and overridden
//! are terminal.
//!
//! Authorization "no" is a typed [`PickupDecision`], never an error. Only
//! infrastructural faults (an attempt that cannot be recorded at all)
//! propagate: a decision that cannot be recorded must not be treated as
//! final.

use crate::db::{check_ins, purge_queue};
use crate::services::photo_match::PhotoMatcher;
use crate::services::photo_vault::{PhotoRef, PhotoStore};
use crate::services::{secrets, SecurityConfig};
use chrono::Utc;
use kidcheck_common::db::models::{CheckInRecord, PickupAttempt, SucceededVia};
use kidcheck_common::Result;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Sentinel audit photo reference recorded when storing the submitted
/// photo failed; storage trouble never blocks the decision itself
const AUDIT_PHOTO_UNAVAILABLE: &str = "AUDIT_PHOTO_UNAVAILABLE";

/// Sentinel values recorded for override entries, which submit no photo or PIN
const OVERRIDE_PHOTO_REF: &str = "EMERGENCY_OVERRIDE";
const OVERRIDE_MASKED_PIN: &str = "OVERRIDE";

/// Outcome of one verification attempt
#[derive(Debug, Clone, PartialEq)]
pub struct PickupDecision {
    pub success: bool,
    pub reason: Option<String>,
    pub requires_manager_override: bool,
}

impl PickupDecision {
    fn allowed() -> Self {
        Self {
            success: true,
            reason: None,
            requires_manager_override: false,
        }
    }

    fn denied(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
            requires_manager_override: false,
        }
    }

    fn denied_requires_override(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
            requires_manager_override: true,
        }
    }
}

/// Verifies pickups against check-in records
pub struct PickupVerifier {
    db: Pool<Sqlite>,
    vault: Arc<dyn PhotoStore>,
    matcher: Arc<dyn PhotoMatcher>,
    config: SecurityConfig,
}

impl PickupVerifier {
    pub fn new(
        db: Pool<Sqlite>,
        vault: Arc<dyn PhotoStore>,
        matcher: Arc<dyn PhotoMatcher>,
        config: SecurityConfig,
    ) -> Self {
        Self {
            db,
            vault,
            matcher,
            config,
        }
    }

    /// Verify a pickup with BOTH photo matching AND a PIN code.
    ///
    /// Success requires the submitted PIN to equal the record's PIN or any
    /// backup code, AND the photo similarity score to reach the threshold.
    /// Every evaluated attempt is appended to the record's audit trail,
    /// success or failure.
    pub async fn verify_pickup(
        &self,
        check_in_id: Uuid,
        submitted_photo: &[u8],
        submitted_pin: &str,
        actor_id: &str,
    ) -> Result<PickupDecision> {
        let id = check_in_id.to_string();

        let record = match check_ins::get_check_in(&self.db, &id).await? {
            Some(record) if !record.checked_out => record,
            _ => {
                return Ok(PickupDecision::denied(
                    "Child already checked out or not found",
                ))
            }
        };

        let attempts = record.attempts()?;

        // Lockout: once the attempt budget is spent, refuse without
        // consuming another slot or contacting the photo oracle
        if attempts.len() >= self.config.max_pickup_attempts {
            return Ok(PickupDecision::denied_requires_override(
                "Maximum pickup attempts exceeded",
            ));
        }

        // PIN factor: primary PIN or any backup authorization code
        let backup_codes = record.backup_codes()?;
        let pin_valid = submitted_pin == record.security_pin
            || backup_codes.iter().any(|code| code == submitted_pin);

        // Photo factor: fail closed. A purged reference photo, a vault or
        // matcher fault, or an out-of-range score all score 0.
        let match_score = self.score_photo(&record, submitted_photo).await;
        let photo_valid = match_score >= self.config.photo_match_threshold;

        let success = pin_valid && photo_valid;

        // The submitted photo is kept (encrypted) for audit before being
        // discarded from memory
        let audit_ref = match self.vault.store(submitted_photo, "pickup_attempt").await {
            Ok(r) => r.as_str().to_string(),
            Err(e) => {
                warn!(check_in_id = %id, error = %e, "Failed to store audit photo");
                AUDIT_PHOTO_UNAVAILABLE.to_string()
            }
        };

        let now = Utc::now();
        let attempt = PickupAttempt {
            timestamp: now,
            masked_pin: secrets::mask_pin(submitted_pin),
            match_score: Some(match_score),
            success,
            actor_id: actor_id.to_string(),
            photo_ref: audit_ref,
            succeeded_via: SucceededVia::Normal,
            override_reason: None,
        };

        let prior_attempts = attempts.len() as i64;
        let mut updated_attempts = attempts;
        updated_attempts.push(attempt);
        let attempts_json = serde_json::to_string(&updated_attempts)?;

        if success {
            let committed = check_ins::record_checkout(
                &self.db,
                &id,
                prior_attempts,
                &attempts_json,
                actor_id,
                now,
            )
            .await?;
            if !committed {
                // A concurrent attempt won the guarded write
                warn!(check_in_id = %id, "Concurrent pickup activity, denying");
                return Ok(PickupDecision::denied("Pickup state changed, please retry"));
            }

            self.purge_photo_material(&record).await;

            info!(check_in_id = %id, actor_id, "Pickup verified, child checked out");
            Ok(PickupDecision::allowed())
        } else {
            let committed =
                check_ins::record_attempt(&self.db, &id, prior_attempts, &attempts_json).await?;
            if !committed {
                warn!(check_in_id = %id, "Concurrent pickup activity, denying");
                return Ok(PickupDecision::denied("Pickup state changed, please retry"));
            }

            let mut reason = String::from("Authentication failed. ");
            if !pin_valid {
                reason.push_str("Invalid PIN. ");
            }
            if !photo_valid {
                reason.push_str(&format!(
                    "Photo match too low ({:.1}% confidence). ",
                    match_score * 100.0
                ));
            }

            let locked = updated_attempts.len() >= self.config.max_pickup_attempts;
            info!(
                check_in_id = %id,
                actor_id,
                match_score,
                attempts = updated_attempts.len(),
                locked,
                "Pickup verification failed"
            );

            if locked {
                Ok(PickupDecision::denied_requires_override(reason))
            } else {
                Ok(PickupDecision::denied(reason))
            }
        }
    }

    /// Manager override for emergency situations.
    ///
    /// No PIN or photo check at all: an explicit, audited trust escalation
    /// for when normal verification cannot work (corrupted reference
    /// photos, changed appearance, device failure). Restricting who may
    /// invoke it is the caller's responsibility. Returns false only when
    /// the record is missing or already checked out.
    pub async fn emergency_override(
        &self,
        check_in_id: Uuid,
        manager_id: &str,
        override_reason: &str,
    ) -> Result<bool> {
        let id = check_in_id.to_string();

        let record = match check_ins::get_check_in(&self.db, &id).await? {
            Some(record) if !record.checked_out => record,
            _ => return Ok(false),
        };

        let attempts = record.attempts()?;
        let now = Utc::now();
        let attempt = PickupAttempt {
            timestamp: now,
            masked_pin: OVERRIDE_MASKED_PIN.to_string(),
            match_score: None,
            success: true,
            actor_id: manager_id.to_string(),
            photo_ref: OVERRIDE_PHOTO_REF.to_string(),
            succeeded_via: SucceededVia::Override,
            // Stored verbatim; the reason is audit material, not a secret
            override_reason: Some(override_reason.to_string()),
        };

        let prior_attempts = attempts.len() as i64;
        let mut updated_attempts = attempts;
        updated_attempts.push(attempt);
        let attempts_json = serde_json::to_string(&updated_attempts)?;

        let checked_out_by = format!("EMERGENCY_OVERRIDE_{}", manager_id);
        let committed = check_ins::record_checkout(
            &self.db,
            &id,
            prior_attempts,
            &attempts_json,
            &checked_out_by,
            now,
        )
        .await?;
        if !committed {
            warn!(check_in_id = %id, "Concurrent pickup activity, override denied");
            return Ok(false);
        }

        self.purge_photo_material(&record).await;

        warn!(
            check_in_id = %id,
            manager_id,
            override_reason,
            "Emergency override: child checked out without verification"
        );
        Ok(true)
    }

    /// Pickup attempt history for audit, oldest first.
    ///
    /// A missing record is an error, distinguishable from a record with no
    /// attempts yet.
    pub async fn get_pickup_history(&self, check_in_id: Uuid) -> Result<Vec<PickupAttempt>> {
        let id = check_in_id.to_string();
        let record = check_ins::get_check_in(&self.db, &id)
            .await?
            .ok_or_else(|| {
                kidcheck_common::Error::NotFound(format!("Check-in not found: {}", id))
            })?;

        record.attempts()
    }

    /// Score the submitted photo against the stored guardian reference.
    ///
    /// Returns 0 when no guardian reference survives (purged or never
    /// captured) or when the vault/matcher fails, so a concurrent retention
    /// sweep makes the photo factor fail rather than silently pass.
    async fn score_photo(&self, record: &CheckInRecord, submitted_photo: &[u8]) -> f64 {
        let Some(guardian_ref) = record.guardian_photo_ref.as_deref() else {
            return 0.0;
        };

        let stored = match self.vault.load(&PhotoRef::new(guardian_ref)).await {
            Ok(blob) => blob,
            Err(e) => {
                warn!(
                    check_in_id = %record.id,
                    error = %e,
                    "Failed to load guardian reference photo, treating as no match"
                );
                return 0.0;
            }
        };

        match self.matcher.compare(&stored, submitted_photo).await {
            Ok(score) if (0.0..=1.0).contains(&score) => score,
            Ok(score) => {
                warn!(
                    check_in_id = %record.id,
                    score,
                    "Matcher returned out-of-range score, treating as no match"
                );
                0.0
            }
            Err(e) => {
                warn!(
                    check_in_id = %record.id,
                    error = %e,
                    "Photo comparison failed, treating as no match"
                );
                0.0
            }
        }
    }

    /// Delete vault blobs referenced by the record and drop its purge
    /// schedule. The database columns were already nulled by the guarded
    /// checkout write; blob deletion is best-effort since the sweep will
    /// not revisit a purged row.
    async fn purge_photo_material(&self, record: &CheckInRecord) {
        for photo_ref in [
            record.child_photo_ref.as_deref(),
            record.guardian_photo_ref.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            if let Err(e) = self.vault.delete(&PhotoRef::new(photo_ref)).await {
                warn!(
                    check_in_id = %record.id,
                    photo_ref,
                    error = %e,
                    "Failed to delete photo blob"
                );
            }
        }

        if let Err(e) = purge_queue::remove(&self.db, &record.id).await {
            warn!(check_in_id = %record.id, error = %e, "Failed to remove purge queue entry");
        }
    }
}
