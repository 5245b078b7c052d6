//! Database layer: initialization, models, and settings access

pub mod init;
pub mod models;
pub mod settings;

pub use init::init_database;
pub use models::{CheckInRecord, PickupAttempt, SucceededVia};
