//! Errors surfaced by the realtime trackers and publisher.

use crate::store::StoreError;

/// Realtime layer error
///
/// Store failures are non-fatal on mutation paths: callers log them and carry
/// on with their primary action. Queries surface them so an outage is never
/// mistaken for "known offline" or "no unread messages". Serialization errors
/// are contract violations and always surface.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("store operation failed: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RealtimeError {
    /// Whether this error came from the store/broker rather than from encoding
    #[must_use]
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Result type for realtime operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;
