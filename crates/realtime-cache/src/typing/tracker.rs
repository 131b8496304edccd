//! Typing indicators.
//!
//! Each room keeps an expiring set of typing users. A marker lasts ten
//! seconds unless the client sends another start. When a marker simply
//! times out no `typing_stop` is published; clients are expected to expire
//! indicators on their side as well.

use realtime_core::{EventEnvelope, EventType, RoomId, UserId};
use std::sync::Arc;
use std::time::Duration;

use crate::error::RealtimeResult;
use crate::pubsub::EventPublisher;
use crate::store::StorePort;

/// Key prefix for typing sets
const TYPING_PREFIX: &str = "typing:";

/// Typing marker TTL (10 seconds)
pub const TYPING_TTL: Duration = Duration::from_secs(10);

/// Tracks who is typing in each room
#[derive(Clone)]
pub struct TypingIndicatorTracker {
    store: Arc<dyn StorePort>,
    publisher: EventPublisher,
}

impl TypingIndicatorTracker {
    /// Create a new typing tracker
    #[must_use]
    pub fn new(store: Arc<dyn StorePort>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    fn typing_key(room_id: &RoomId) -> String {
        format!("{TYPING_PREFIX}{room_id}")
    }

    /// Start or stop typing.
    ///
    /// Stopping always publishes `typing_stop`, even if the marker had
    /// already expired.
    pub async fn set_typing(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        is_typing: bool,
    ) -> RealtimeResult<()> {
        let key = Self::typing_key(room_id);

        let event_type = if is_typing {
            self.store
                .expiring_add(&key, user_id.as_str(), TYPING_TTL)
                .await?;
            EventType::TypingStart
        } else {
            self.store.expiring_remove(&key, user_id.as_str()).await?;
            EventType::TypingStop
        };

        tracing::trace!(room_id = %room_id, user_id = %user_id, is_typing, "Set typing");

        self.publisher
            .publish(EventEnvelope::new(
                event_type,
                room_id.clone(),
                user_id.clone(),
            ))
            .await?;

        Ok(())
    }

    /// Users currently typing in a room
    pub async fn get_typing_users(&self, room_id: &RoomId) -> RealtimeResult<Vec<UserId>> {
        let members = self
            .store
            .expiring_members(&Self::typing_key(room_id))
            .await?;
        Ok(members.into_iter().map(UserId::from).collect())
    }

    /// Whether a user is currently typing in a room
    pub async fn is_typing(&self, room_id: &RoomId, user_id: &UserId) -> RealtimeResult<bool> {
        Ok(self
            .store
            .expiring_contains(&Self::typing_key(room_id), user_id.as_str())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::PubSubChannel;
    use crate::store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, TypingIndicatorTracker) {
        let store = Arc::new(MemoryStore::new());
        let tracker =
            TypingIndicatorTracker::new(store.clone(), EventPublisher::new(store.clone()));
        (store, tracker)
    }

    fn r1() -> RoomId {
        RoomId::from("r1")
    }

    #[tokio::test]
    async fn test_start_and_stop_typing() {
        let (_, tracker) = setup();
        let alice = UserId::from("alice");

        tracker.set_typing(&r1(), &alice, true).await.unwrap();
        assert_eq!(tracker.get_typing_users(&r1()).await.unwrap(), vec![alice.clone()]);
        assert!(tracker.is_typing(&r1(), &alice).await.unwrap());

        tracker.set_typing(&r1(), &alice, false).await.unwrap();
        assert!(tracker.get_typing_users(&r1()).await.unwrap().is_empty());
        assert!(!tracker.is_typing(&r1(), &alice).await.unwrap());
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let (store, tracker) = setup();
        let mut rx = store.subscribe(&PubSubChannel::room(r1()));
        let bob = UserId::from("bob");

        tracker.set_typing(&r1(), &bob, true).await.unwrap();
        tracker.set_typing(&r1(), &bob, false).await.unwrap();

        let first = rx.recv().await.unwrap().envelope.unwrap();
        let second = rx.recv().await.unwrap().envelope.unwrap();
        assert_eq!(first.event_type, EventType::TypingStart);
        assert_eq!(second.event_type, EventType::TypingStop);
        assert_eq!(first.user_id, bob);
        assert_eq!(second.room_id, r1());
    }

    #[tokio::test(start_paused = true)]
    async fn test_marker_expires_silently() {
        let (store, tracker) = setup();
        let alice = UserId::from("alice");
        tracker.set_typing(&r1(), &alice, true).await.unwrap();

        let mut rx = store.subscribe(&PubSubChannel::room(r1()));
        tokio::time::advance(TYPING_TTL).await;

        assert!(tracker.get_typing_users(&r1()).await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_markers_expire_independently() {
        let (_, tracker) = setup();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        tracker.set_typing(&r1(), &alice, true).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        tracker.set_typing(&r1(), &bob, true).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(tracker.get_typing_users(&r1()).await.unwrap(), vec![bob]);
    }

    #[tokio::test]
    async fn test_stop_without_start_still_publishes() {
        let (store, tracker) = setup();
        let mut rx = store.subscribe(&PubSubChannel::room(r1()));

        tracker
            .set_typing(&r1(), &UserId::from("carol"), false)
            .await
            .unwrap();

        let envelope = rx.recv().await.unwrap().envelope.unwrap();
        assert_eq!(envelope.event_type, EventType::TypingStop);
    }

    #[tokio::test]
    async fn test_rooms_are_separate() {
        let (_, tracker) = setup();
        let alice = UserId::from("alice");
        tracker.set_typing(&r1(), &alice, true).await.unwrap();

        assert!(tracker
            .get_typing_users(&RoomId::from("r2"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_outage_is_surfaced() {
        let (store, tracker) = setup();
        store.set_unavailable(true);

        assert!(tracker.get_typing_users(&r1()).await.is_err());
        assert!(tracker
            .set_typing(&r1(), &UserId::from("alice"), true)
            .await
            .unwrap_err()
            .is_store_failure());
    }
}
