//! User presence tracking.
//!
//! A presence record lives at `presence:{user_id}` for five minutes unless a
//! heartbeat or status change rewrites it. Online users are also members of
//! the `online_users` expiring set with the same TTL. The record and the set
//! entry are written in two round trips, so a failure between them can leave
//! them briefly out of step until the TTL settles it.

use realtime_core::{EventEnvelope, PresenceRecord, PresenceStatus, RoomId, UserId};
use std::sync::Arc;
use std::time::Duration;

use crate::error::RealtimeResult;
use crate::pubsub::EventPublisher;
use crate::store::StorePort;

/// Key prefix for user presence
const PRESENCE_PREFIX: &str = "presence:";
/// Expiring set of online users
pub const ONLINE_USERS_KEY: &str = "online_users";

/// Presence TTL (5 minutes - refreshed by heartbeat)
pub const PRESENCE_TTL: Duration = Duration::from_secs(300);

/// Tracks presence records and the online membership set
#[derive(Clone)]
pub struct PresenceTracker {
    store: Arc<dyn StorePort>,
    publisher: EventPublisher,
}

impl PresenceTracker {
    /// Create a new presence tracker
    #[must_use]
    pub fn new(store: Arc<dyn StorePort>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    /// Generate store key for user presence
    fn presence_key(user_id: &UserId) -> String {
        format!("{PRESENCE_PREFIX}{user_id}")
    }

    /// Set a user's presence.
    ///
    /// Online users are added to (or refreshed in) the online set; any other
    /// status removes them from it immediately. When a room is given, a
    /// `presence_update` is published there, with invisible users shown as
    /// offline.
    pub async fn set_presence(
        &self,
        user_id: &UserId,
        status: PresenceStatus,
        room_id: Option<&RoomId>,
    ) -> RealtimeResult<PresenceRecord> {
        let record = PresenceRecord::new(user_id.clone(), status).with_room(room_id.cloned());
        self.write(&record).await?;

        if let Some(room_id) = room_id {
            self.publisher
                .publish(EventEnvelope::presence_update(
                    room_id.clone(),
                    record.public_view(),
                ))
                .await?;
        }

        Ok(record)
    }

    /// Write the record and keep the online set in step with it
    async fn write(&self, record: &PresenceRecord) -> RealtimeResult<()> {
        let payload = serde_json::to_string(record)?;
        self.store
            .set_value(&Self::presence_key(&record.user_id), &payload, PRESENCE_TTL)
            .await?;

        let user = record.user_id.as_str();
        if record.status.is_online() {
            self.store
                .expiring_add(ONLINE_USERS_KEY, user, PRESENCE_TTL)
                .await?;
        } else {
            self.store.expiring_remove(ONLINE_USERS_KEY, user).await?;
        }

        tracing::debug!(
            user_id = %record.user_id,
            status = %record.status,
            "Set user presence"
        );

        Ok(())
    }

    /// Get a user's presence.
    ///
    /// A user with no record is offline as of now; that is an answer, not an error.
    pub async fn get_presence(&self, user_id: &UserId) -> RealtimeResult<PresenceRecord> {
        match self.store.get_value(&Self::presence_key(user_id)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(PresenceRecord::offline(user_id.clone())),
        }
    }

    /// Get presence for multiple users
    pub async fn get_presences(&self, user_ids: &[UserId]) -> RealtimeResult<Vec<PresenceRecord>> {
        let mut presences = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            presences.push(self.get_presence(user_id).await?);
        }
        Ok(presences)
    }

    /// Refresh presence TTL (called on heartbeat).
    ///
    /// Returns `false` if there was no record to refresh. The rewrite only
    /// lands while the record still exists, so a clear that races the
    /// heartbeat wins and the user stays offline; that case returns `true`.
    pub async fn refresh_presence(&self, user_id: &UserId) -> RealtimeResult<bool> {
        let key = Self::presence_key(user_id);
        let Some(raw) = self.store.get_value(&key).await? else {
            return Ok(false);
        };

        let mut record: PresenceRecord = serde_json::from_str(&raw)?;
        record.touch();
        let payload = serde_json::to_string(&record)?;
        if !self
            .store
            .set_value_if_exists(&key, &payload, PRESENCE_TTL)
            .await?
        {
            tracing::debug!(user_id = %user_id, "Presence cleared during refresh");
            return Ok(true);
        }

        if record.status.is_online() {
            self.store
                .expiring_add(ONLINE_USERS_KEY, user_id.as_str(), PRESENCE_TTL)
                .await?;
        }

        tracing::debug!(user_id = %user_id, status = %record.status, "Refreshed user presence");

        Ok(true)
    }

    /// Users currently in the online set
    pub async fn list_online(&self) -> RealtimeResult<Vec<UserId>> {
        let members = self.store.expiring_members(ONLINE_USERS_KEY).await?;
        Ok(members.into_iter().map(UserId::from).collect())
    }

    /// Number of users currently online
    pub async fn online_count(&self) -> RealtimeResult<usize> {
        Ok(self.store.expiring_members(ONLINE_USERS_KEY).await?.len())
    }

    /// Remove a user's presence immediately (disconnect or logout).
    ///
    /// Returns whether a record existed.
    pub async fn clear_presence(&self, user_id: &UserId) -> RealtimeResult<bool> {
        let existed = self
            .store
            .delete_many(&[Self::presence_key(user_id).as_str()])
            .await?
            > 0;
        self.store
            .expiring_remove(ONLINE_USERS_KEY, user_id.as_str())
            .await?;

        tracing::debug!(user_id = %user_id, existed, "Cleared user presence");

        Ok(existed)
    }
}
