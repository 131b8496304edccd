//! Shared store and broker port.
//!
//! The store/broker is the only cross-process mutable state in the system.
//! Every tracker talks to it through [`StorePort`], so production code runs
//! against Redis ([`RedisStore`]) and tests run against [`MemoryStore`].
//!
//! Missing keys are a normal state (everything here expires by TTL) and are
//! reported as `None`, empty collections or `false`, never as errors.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::pool::RedisPoolError;

/// Store error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store or broker could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Deadline elapsed before the store answered
    #[error("store command timed out after {0:?}")]
    Timeout(Duration),

    /// Store answered with something the caller cannot interpret
    #[error("unexpected store reply: {0}")]
    InvalidReply(String),
}

impl StoreError {
    /// Whether the store's state is unknown (outage or deadline) rather than malformed
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl From<RedisPoolError> for StoreError {
    fn from(err: RedisPoolError) -> Self {
        if err.is_connection_failure() {
            Self::Unavailable(err.to_string())
        } else {
            Self::InvalidReply(err.to_string())
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Capability interface over the shared key-value store and pub/sub broker.
///
/// Every method is a single atomic round trip. Implementations must be safe
/// to call concurrently from many tasks; no locking happens above this trait.
/// Dropping a returned future cancels the operation.
#[async_trait]
pub trait StorePort: Send + Sync {
    /// Set a string value with a TTL, replacing any previous value
    async fn set_value(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Replace a value and its TTL only if the key currently exists.
    /// Returns whether the write happened.
    async fn set_value_if_exists(&self, key: &str, value: &str, ttl: Duration)
        -> StoreResult<bool>;

    /// Get a string value
    async fn get_value(&self, key: &str) -> StoreResult<Option<String>>;

    /// Delete keys, returning how many existed
    async fn delete_many(&self, keys: &[&str]) -> StoreResult<u64>;

    /// Atomically add one to an integer value and reset its TTL.
    /// A missing key counts as zero.
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> StoreResult<i64>;

    /// Add or refresh a member of an expiring set.
    ///
    /// The member lives for `ttl` unless refreshed; the set key's own TTL is
    /// reset to `ttl` as well.
    async fn expiring_add(&self, key: &str, member: &str, ttl: Duration) -> StoreResult<()>;

    /// Remove a member from an expiring set, returning whether it was live
    async fn expiring_remove(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Live members of an expiring set
    async fn expiring_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Check whether a member of an expiring set is live
    async fn expiring_contains(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Publish a payload on a broker channel, returning the number of receivers
    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<u32>;

    /// Check that the store is reachable
    async fn health_check(&self) -> StoreResult<()>;
}
