//! Database access for check-in records and the photo purge queue

pub mod check_ins;
pub mod purge_queue;
