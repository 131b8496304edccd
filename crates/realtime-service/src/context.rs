//! Realtime context - dependency container for the realtime service
//!
//! Wires every tracker to one shared store so they agree on keys and on the
//! broker they publish through.

use std::sync::Arc;

use realtime_cache::{
    EventPublisher, PresenceTracker, StorePort, TypingIndicatorTracker, UnreadCounterStore,
};

/// Shared store plus the components built on it
#[derive(Clone)]
pub struct RealtimeContext {
    store: Arc<dyn StorePort>,
    publisher: EventPublisher,
    presence: PresenceTracker,
    typing: TypingIndicatorTracker,
    unread: UnreadCounterStore,
}

impl RealtimeContext {
    /// Build all components over one store
    pub fn new(store: Arc<dyn StorePort>) -> Self {
        let publisher = EventPublisher::new(store.clone());
        let presence = PresenceTracker::new(store.clone(), publisher.clone());
        let typing = TypingIndicatorTracker::new(store.clone(), publisher.clone());
        let unread = UnreadCounterStore::new(store.clone());

        Self {
            store,
            publisher,
            presence,
            typing,
            unread,
        }
    }

    /// Get the underlying store
    pub fn store(&self) -> &dyn StorePort {
        self.store.as_ref()
    }

    /// Get the envelope publisher
    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Get the presence tracker
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Get the typing tracker
    pub fn typing(&self) -> &TypingIndicatorTracker {
        &self.typing
    }

    /// Get the unread counter store
    pub fn unread(&self) -> &UnreadCounterStore {
        &self.unread
    }
}

impl std::fmt::Debug for RealtimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeContext").finish_non_exhaustive()
    }
}
