//! Error taxonomy for unit resolution.
//!
//! Errors are cloneable so one settled fetch can be observed by every ref that
//! shares its cache key.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unit '{unit_id}' not found in faction '{faction_id}'")]
    NotFound { faction_id: String, unit_id: String },

    #[error("faction '{faction_id}' not found")]
    FactionNotFound { faction_id: String },

    #[error("fetch of {key} failed: {reason}")]
    TransientFetchFailure { key: String, reason: String },

    #[error("record {key} is malformed: {reason}")]
    MalformedRecord { key: String, reason: String },
}

impl ResolveError {
    pub fn transient(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::TransientFetchFailure {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedRecord {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// True when re-invoking resolution may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFetchFailure { .. })
    }
}
