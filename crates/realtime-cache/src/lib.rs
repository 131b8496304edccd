//! # realtime-cache
//!
//! Shared-store layer for presence, typing indicators, unread counters and
//! pub/sub fanout across server processes.
//!
//! ## Features
//!
//! - **Store Port**: `StorePort` trait with a Redis adapter and an in-memory fake
//! - **Presence**: User status records and the online user set
//! - **Typing**: Short-lived per-room typing markers
//! - **Unread**: Per-user, per-room unread counters
//! - **Pub/Sub**: Envelope fanout to room and user channels, plus a Redis subscriber
//!
//! ## Example
//!
//! ```ignore
//! use realtime_cache::{EventPublisher, PresenceTracker, RedisStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(RedisStore::from_config(&config.redis)?);
//! let publisher = EventPublisher::new(store.clone());
//! let presence = PresenceTracker::new(store.clone(), publisher.clone());
//!
//! presence
//!     .set_presence(&user_id, PresenceStatus::Online, Some(&room_id))
//!     .await?;
//! ```

pub mod error;
pub mod pool;
pub mod presence;
pub mod pubsub;
pub mod store;
pub mod typing;
pub mod unread;

pub use error::{RealtimeError, RealtimeResult};

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export store types
pub use store::{MemoryStore, RedisStore, StoreError, StorePort, StoreResult};

// Re-export tracker types
pub use presence::{PresenceTracker, ONLINE_USERS_KEY, PRESENCE_TTL};
pub use typing::{TypingIndicatorTracker, TYPING_TTL};
pub use unread::{UnreadCounterStore, UNREAD_TTL};

// Re-export pubsub types
pub use pubsub::{
    EventPublisher, PubSubChannel, PublishReceipt, ReceivedMessage, Subscriber,
    SubscriberBuilder, SubscriberConfig, SubscriberError, SubscriberResult, ROOM_CHANNEL_PREFIX,
    USER_CHANNEL_PREFIX,
};
