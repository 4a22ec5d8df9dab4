//! Request-boundary error taxonomy.
//!
//! Services and storage use `anyhow` internally; at the HTTP boundary the
//! failure modes that matter to a caller are collapsed into [`EngineError`]:
//! input errors are rejected before any evaluation, store errors surface as
//! retryable failures. Per-badge and per-user failures never reach this type
//! at all — they are recorded in the pass summary and the pass continues.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// `scope=user` recalculation without a user id.
    #[error("user_id is required when scope is \"user\"")]
    MissingUserId,

    /// A leaderboard request named a metric outside the supported set.
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// The store failed for the whole request. Safe to retry.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether the error is the caller's fault (maps to a 4xx status).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::MissingUserId | EngineError::UnknownMetric(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_classified() {
        assert!(EngineError::MissingUserId.is_client_error());
        assert!(EngineError::UnknownMetric("karma".to_string()).is_client_error());
        assert!(!EngineError::Store(anyhow::anyhow!("connection reset")).is_client_error());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EngineError::UnknownMetric("karma".to_string()).to_string(),
            "unknown metric: karma"
        );
    }
}
