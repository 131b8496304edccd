//! Envelope publisher.
//!
//! Every envelope goes to its room channel. Message and membership envelopes
//! are also copied to the originating user's channel so their other sessions
//! can update badges outside the room. That second publish is best-effort.

use chrono::{DateTime, Utc};
use realtime_core::EventEnvelope;
use std::sync::Arc;

use crate::error::RealtimeResult;
use crate::pubsub::PubSubChannel;
use crate::store::StorePort;

/// Outcome of a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Subscribers reached on the room channel
    pub room_receivers: u32,
    /// Subscribers reached on the user channel; `None` if not attempted or failed
    pub user_receivers: Option<u32>,
    /// Timestamp stamped on the envelope
    pub published_at: DateTime<Utc>,
}

/// Broadcasts envelopes through the shared broker
#[derive(Clone)]
pub struct EventPublisher {
    store: Arc<dyn StorePort>,
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher").finish_non_exhaustive()
    }
}

impl EventPublisher {
    /// Create a new publisher
    #[must_use]
    pub fn new(store: Arc<dyn StorePort>) -> Self {
        Self { store }
    }

    /// Publish an envelope.
    ///
    /// The timestamp is always set here, replacing whatever the caller put in.
    /// Only the room-channel publish can fail this call.
    pub async fn publish(&self, mut envelope: EventEnvelope) -> RealtimeResult<PublishReceipt> {
        envelope.timestamp = Utc::now();
        let payload = envelope.to_json()?;

        let room_channel = PubSubChannel::room(envelope.room_id.clone()).name();
        let room_receivers = self.store.publish(&room_channel, &payload).await?;

        tracing::debug!(
            channel = %room_channel,
            event_type = %envelope.event_type,
            receivers = room_receivers,
            "Published event"
        );

        let user_receivers = if envelope.event_type.notifies_user() {
            let user_channel = PubSubChannel::user(envelope.user_id.clone()).name();
            self.publish_best_effort(&user_channel, &payload, &envelope)
                .await
        } else {
            None
        };

        Ok(PublishReceipt {
            room_receivers,
            user_receivers,
            published_at: envelope.timestamp,
        })
    }

    /// Publish where failure is logged and swallowed
    async fn publish_best_effort(
        &self,
        channel: &str,
        payload: &str,
        envelope: &EventEnvelope,
    ) -> Option<u32> {
        match self.store.publish(channel, payload).await {
            Ok(receivers) => {
                tracing::debug!(
                    channel = %channel,
                    event_type = %envelope.event_type,
                    receivers = receivers,
                    "Published event to user channel"
                );
                Some(receivers)
            }
            Err(e) => {
                tracing::warn!(
                    channel = %channel,
                    event_type = %envelope.event_type,
                    room_id = %envelope.room_id,
                    error = %e,
                    "User channel publish failed"
                );
                None
            }
        }
    }
}
