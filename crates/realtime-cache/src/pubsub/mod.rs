//! Pub/Sub module.
//!
//! Channel naming, the envelope publisher, and the Redis subscriber used by
//! connection managers to receive fanned-out envelopes.

mod channels;
mod publisher;
mod subscriber;

pub use channels::{PubSubChannel, ROOM_CHANNEL_PREFIX, USER_CHANNEL_PREFIX};
pub use publisher::{EventPublisher, PublishReceipt};
pub use subscriber::{
    ReceivedMessage, Subscriber, SubscriberBuilder, SubscriberConfig, SubscriberError,
    SubscriberResult,
};
