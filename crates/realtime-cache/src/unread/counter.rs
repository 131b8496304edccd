//! Unread message counters.
//!
//! One integer per (user, room) at `unread:{user_id}:{room_id}`. Counters
//! are bumped atomically and live for thirty days after the last increment.
//! Ids may contain `:`, so `%` and `:` are percent-escaped inside the key.

use realtime_core::{RoomId, UserId};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RealtimeResult;
use crate::store::{StoreError, StorePort};

/// Key prefix for unread counters
const UNREAD_PREFIX: &str = "unread:";

/// Unread counter TTL (30 days - refreshed on increment)
pub const UNREAD_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Per-user, per-room unread counts
#[derive(Clone)]
pub struct UnreadCounterStore {
    store: Arc<dyn StorePort>,
}

impl UnreadCounterStore {
    /// Create a new counter store
    #[must_use]
    pub fn new(store: Arc<dyn StorePort>) -> Self {
        Self { store }
    }

    fn unread_key(user_id: &UserId, room_id: &RoomId) -> String {
        format!(
            "{UNREAD_PREFIX}{}:{}",
            key_part(user_id.as_str()),
            key_part(room_id.as_str())
        )
    }

    /// Add one unread message, returning the new count
    pub async fn increment(&self, user_id: &UserId, room_id: &RoomId) -> RealtimeResult<u64> {
        let count = self
            .store
            .incr_with_ttl(&Self::unread_key(user_id, room_id), UNREAD_TTL)
            .await?;

        tracing::debug!(user_id = %user_id, room_id = %room_id, count, "Incremented unread");

        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Clear the counter; returns whether there was one
    pub async fn reset(&self, user_id: &UserId, room_id: &RoomId) -> RealtimeResult<bool> {
        let deleted = self
            .store
            .delete_many(&[Self::unread_key(user_id, room_id).as_str()])
            .await?;
        Ok(deleted > 0)
    }

    /// Current count, zero if there is no counter
    pub async fn get(&self, user_id: &UserId, room_id: &RoomId) -> RealtimeResult<u64> {
        let key = Self::unread_key(user_id, room_id);
        let Some(raw) = self.store.get_value(&key).await? else {
            return Ok(0);
        };

        let count: i64 = raw
            .parse()
            .map_err(|_| StoreError::InvalidReply(format!("counter at {key} is not an integer")))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Counts for several rooms, in the order given
    pub async fn get_many(
        &self,
        user_id: &UserId,
        room_ids: &[RoomId],
    ) -> RealtimeResult<Vec<(RoomId, u64)>> {
        let mut counts = Vec::with_capacity(room_ids.len());
        for room_id in room_ids {
            counts.push((room_id.clone(), self.get(user_id, room_id).await?));
        }
        Ok(counts)
    }
}

/// Escape the key separator (and the escape character itself)
fn key_part(id: &str) -> Cow<'_, str> {
    if id.contains(['%', ':']) {
        Cow::Owned(id.replace('%', "%25").replace(':', "%3A"))
    } else {
        Cow::Borrowed(id)
    }
}
