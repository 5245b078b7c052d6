//! Photo similarity oracle
//!
//! Opaque scoring function behind a trait so tests supply deterministic
//! scores and production backs it with a vision API. Callers treat any
//! error or out-of-range score as "no match" (fail closed); a crash in
//! the oracle must never be mistaken for an authorization success.

use async_trait::async_trait;
use kidcheck_common::{Error, Result};

/// Black-box similarity scorer over two photo payloads
#[async_trait]
pub trait PhotoMatcher: Send + Sync {
    /// Compare a stored reference photo against a submitted one, returning
    /// a similarity score in `[0, 1]`
    async fn compare(&self, stored: &[u8], submitted: &[u8]) -> Result<f64>;
}

/// Matcher returning a fixed score, for tests and local development
#[derive(Debug, Clone)]
pub struct FixedScoreMatcher {
    score: f64,
}

impl FixedScoreMatcher {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

#[async_trait]
impl PhotoMatcher for FixedScoreMatcher {
    async fn compare(&self, _stored: &[u8], _submitted: &[u8]) -> Result<f64> {
        Ok(self.score)
    }
}

/// Matcher that always fails, for exercising the fail-closed path
#[derive(Debug, Clone, Default)]
pub struct FailingMatcher;

#[async_trait]
impl PhotoMatcher for FailingMatcher {
    async fn compare(&self, _stored: &[u8], _submitted: &[u8]) -> Result<f64> {
        Err(Error::Internal("Photo comparison service unavailable".to_string()))
    }
}
