//! Realtime service
//!
//! Entry points called by the connection manager, the durable message store
//! and the REST layer. Presence and unread bookkeeping is auxiliary: when it
//! fails the hook logs and carries on so the caller's primary action (a
//! connection, a persisted message) is never undone by a cache outage.
//! Primary publishes and queries return their errors.

use futures_util::future::join_all;
use realtime_cache::{PublishReceipt, RealtimeResult, StorePort};
use realtime_core::{EventEnvelope, EventType, PresenceRecord, PresenceStatus, RoomId, UserId};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::context::RealtimeContext;

/// Realtime presence, typing and unread facade
#[derive(Debug, Clone)]
pub struct RealtimeService {
    ctx: RealtimeContext,
}

impl RealtimeService {
    /// Create a service from an existing context
    pub fn new(ctx: RealtimeContext) -> Self {
        Self { ctx }
    }

    /// Create a service over a store
    pub fn from_store(store: Arc<dyn StorePort>) -> Self {
        Self::new(RealtimeContext::new(store))
    }

    /// Get the service context
    pub fn context(&self) -> &RealtimeContext {
        &self.ctx
    }

    // === Connection lifecycle ===

    /// A client connected; mark the user online
    #[instrument(skip(self))]
    pub async fn on_connect(&self, user_id: &UserId, room_id: Option<&RoomId>) {
        match self
            .ctx
            .presence()
            .set_presence(user_id, PresenceStatus::Online, room_id)
            .await
        {
            Ok(_) => info!(user_id = %user_id, "User connected"),
            Err(e) => warn!(user_id = %user_id, error = %e, "Failed to set presence on connect"),
        }
    }

    /// Client heartbeat; renews presence, recreating it if it already expired
    #[instrument(skip(self))]
    pub async fn heartbeat(&self, user_id: &UserId) {
        match self.ctx.presence().refresh_presence(user_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(user_id = %user_id, "Presence expired before heartbeat, recreating");
                if let Err(e) = self
                    .ctx
                    .presence()
                    .set_presence(user_id, PresenceStatus::Online, None)
                    .await
                {
                    warn!(user_id = %user_id, error = %e, "Failed to recreate presence");
                }
            }
            Err(e) => warn!(user_id = %user_id, error = %e, "Failed to refresh presence"),
        }
    }

    /// A client disconnected.
    ///
    /// Clears presence, stops typing in every room where the user was typing,
    /// and tells those rooms the user went offline.
    #[instrument(skip(self))]
    pub async fn on_disconnect(&self, user_id: &UserId, room_ids: &[RoomId]) {
        if let Err(e) = self.ctx.presence().clear_presence(user_id).await {
            warn!(user_id = %user_id, error = %e, "Failed to clear presence on disconnect");
        }

        for room_id in room_ids {
            self.stop_typing_if_active(room_id, user_id).await;

            let offline = EventEnvelope::presence_update(
                room_id.clone(),
                PresenceRecord::offline(user_id.clone()),
            );
            if let Err(e) = self.ctx.publisher().publish(offline).await {
                warn!(room_id = %room_id, user_id = %user_id, error = %e, "Failed to publish offline presence");
            }
        }

        info!(user_id = %user_id, rooms = room_ids.len(), "User disconnected");
    }

    /// Explicit status change from the user
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        user_id: &UserId,
        status: PresenceStatus,
        room_id: Option<&RoomId>,
    ) -> RealtimeResult<PresenceRecord> {
        let record = self
            .ctx
            .presence()
            .set_presence(user_id, status, room_id)
            .await?;

        info!(user_id = %user_id, status = %status, "Presence updated");

        Ok(record)
    }

    // === Rooms ===

    /// Announce that a user joined a room
    #[instrument(skip(self))]
    pub async fn join_room(&self, room_id: &RoomId, user_id: &UserId) -> RealtimeResult<PublishReceipt> {
        self.ctx
            .publisher()
            .publish(EventEnvelope::new(
                EventType::UserJoined,
                room_id.clone(),
                user_id.clone(),
            ))
            .await
    }

    /// Announce that a user left a room, stopping any typing indicator there
    #[instrument(skip(self))]
    pub async fn leave_room(&self, room_id: &RoomId, user_id: &UserId) -> RealtimeResult<PublishReceipt> {
        let receipt = self
            .ctx
            .publisher()
            .publish(EventEnvelope::new(
                EventType::UserLeft,
                room_id.clone(),
                user_id.clone(),
            ))
            .await?;

        self.stop_typing_if_active(room_id, user_id).await;

        Ok(receipt)
    }

    /// Start or stop typing on behalf of a connected client
    #[instrument(skip(self))]
    pub async fn set_typing(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        is_typing: bool,
    ) -> RealtimeResult<()> {
        self.ctx
            .typing()
            .set_typing(room_id, user_id, is_typing)
            .await
    }

    async fn stop_typing_if_active(&self, room_id: &RoomId, user_id: &UserId) {
        let typing = match self.ctx.typing().is_typing(room_id, user_id).await {
            Ok(typing) => typing,
            Err(e) => {
                warn!(room_id = %room_id, user_id = %user_id, error = %e, "Failed to read typing state");
                return;
            }
        };

        if typing {
            if let Err(e) = self.ctx.typing().set_typing(room_id, user_id, false).await {
                warn!(room_id = %room_id, user_id = %user_id, error = %e, "Failed to stop typing");
            }
        }
    }

    // === Messages ===

    /// A message was durably stored.
    ///
    /// Publishes `new_message`, then bumps the unread counter of every
    /// recipient other than the sender.
    #[instrument(skip(self, message, recipients), fields(recipient_count = recipients.len()))]
    pub async fn on_message_persisted(
        &self,
        room_id: &RoomId,
        sender_id: &UserId,
        message: serde_json::Value,
        recipients: &[UserId],
    ) -> RealtimeResult<PublishReceipt> {
        let receipt = self
            .ctx
            .publisher()
            .publish(EventEnvelope::new_message(
                room_id.clone(),
                sender_id.clone(),
                message,
            ))
            .await?;

        let unread = self.ctx.unread();
        let results = join_all(
            recipients
                .iter()
                .filter(|user_id| *user_id != sender_id)
                .map(|user_id| async move { (user_id, unread.increment(user_id, room_id).await) }),
        )
        .await;

        for (user_id, result) in results {
            if let Err(e) = result {
                warn!(room_id = %room_id, user_id = %user_id, error = %e, "Failed to increment unread");
            }
        }

        Ok(receipt)
    }

    /// The user read a room; clears the counter and tells the room
    #[instrument(skip(self))]
    pub async fn mark_read(&self, user_id: &UserId, room_id: &RoomId) -> RealtimeResult<bool> {
        let cleared = self.ctx.unread().reset(user_id, room_id).await?;

        let envelope = EventEnvelope::new(EventType::MessageRead, room_id.clone(), user_id.clone());
        if let Err(e) = self.ctx.publisher().publish(envelope).await {
            warn!(room_id = %room_id, user_id = %user_id, error = %e, "Failed to publish read receipt");
        }

        Ok(cleared)
    }

    // === Queries ===

    /// Get a user's presence
    #[instrument(skip(self))]
    pub async fn presence(&self, user_id: &UserId) -> RealtimeResult<PresenceRecord> {
        self.ctx.presence().get_presence(user_id).await
    }

    /// Get presence for multiple users
    #[instrument(skip(self, user_ids))]
    pub async fn presences(&self, user_ids: &[UserId]) -> RealtimeResult<Vec<PresenceRecord>> {
        self.ctx.presence().get_presences(user_ids).await
    }

    /// Users currently online
    #[instrument(skip(self))]
    pub async fn list_online(&self) -> RealtimeResult<Vec<UserId>> {
        self.ctx.presence().list_online().await
    }

    /// Number of users currently online
    pub async fn online_count(&self) -> RealtimeResult<usize> {
        self.ctx.presence().online_count().await
    }

    /// Users typing in a room
    #[instrument(skip(self))]
    pub async fn typing_users(&self, room_id: &RoomId) -> RealtimeResult<Vec<UserId>> {
        self.ctx.typing().get_typing_users(room_id).await
    }

    /// Unread count for one room
    #[instrument(skip(self))]
    pub async fn unread(&self, user_id: &UserId, room_id: &RoomId) -> RealtimeResult<u64> {
        self.ctx.unread().get(user_id, room_id).await
    }

    /// Unread counts for several rooms
    #[instrument(skip(self, room_ids))]
    pub async fn unread_many(
        &self,
        user_id: &UserId,
        room_ids: &[RoomId],
    ) -> RealtimeResult<Vec<(RoomId, u64)>> {
        self.ctx.unread().get_many(user_id, room_ids).await
    }

    /// Check that the shared store is reachable
    pub async fn health_check(&self) -> RealtimeResult<()> {
        Ok(self.ctx.store().health_check().await?)
    }
}
