//! # KidCheck Check-In Security Service
//!
//! Child check-in security and pickup verification:
//! - Check-in record creation with generated PIN, QR token, and backup codes
//! - Dual-factor pickup verification (PIN + photo match) with bounded-retry
//!   lockout and an audited manager override
//! - Encrypted photo vault with time-boxed retention and a scheduled
//!   retention sweep

pub mod db;
pub mod services;

pub use services::check_in_manager::{CheckInManager, CheckInReceipt};
pub use services::photo_match::{FailingMatcher, FixedScoreMatcher, PhotoMatcher};
pub use services::photo_vault::{EncryptedPhotoVault, PhotoRef, PhotoStore};
pub use services::pickup_verifier::{PickupDecision, PickupVerifier};
pub use services::retention_sweeper::{RetentionSweeper, SweeperConfig};
pub use services::SecurityConfig;
