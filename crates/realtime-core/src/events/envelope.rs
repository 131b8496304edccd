//! Event envelope
//!
//! The structured payload fanned out to every process subscribed to a room
//! or user channel. Envelopes exist only in flight and are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::PresenceRecord;
use crate::value_objects::{RoomId, UserId};

/// Envelope types
///
/// These are the names sent in the `type` field of every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A message was persisted in a room
    NewMessage,
    /// User started typing
    TypingStart,
    /// User stopped typing (explicitly; expiry is silent)
    TypingStop,
    /// User joined a room
    UserJoined,
    /// User left a room
    UserLeft,
    /// User status changed
    PresenceUpdate,
    /// User acknowledged the room's messages
    MessageRead,
    /// Keep-alive
    Heartbeat,
    /// Error report
    Error,
}

impl EventType {
    /// Get the string representation of the event type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::TypingStart => "typing_start",
            Self::TypingStop => "typing_stop",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::PresenceUpdate => "presence_update",
            Self::MessageRead => "message_read",
            Self::Heartbeat => "heartbeat",
            Self::Error => "error",
        }
    }

    /// Whether envelopes of this type are also sent to the originating
    /// user's channel, for notifications outside the room (badges etc.)
    #[must_use]
    pub const fn notifies_user(self) -> bool {
        matches!(self, Self::NewMessage | Self::UserJoined | Self::UserLeft)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event envelope broadcast on room and user channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Envelope type
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Room the event belongs to
    pub room_id: RoomId,
    /// User the event is about
    pub user_id: UserId,
    /// Message payload (`new_message`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    /// Presence payload (`presence_update`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceRecord>,
    /// Free-form payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error description (`error`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Publish time; overwritten by the publisher
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    /// Create a new envelope with no payload
    #[must_use]
    pub fn new(event_type: EventType, room_id: RoomId, user_id: UserId) -> Self {
        Self {
            event_type,
            room_id,
            user_id,
            message: None,
            presence: None,
            data: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a `new_message` envelope
    #[must_use]
    pub fn new_message(room_id: RoomId, user_id: UserId, message: serde_json::Value) -> Self {
        Self::new(EventType::NewMessage, room_id, user_id).with_message(message)
    }

    /// Create a `presence_update` envelope
    #[must_use]
    pub fn presence_update(room_id: RoomId, presence: PresenceRecord) -> Self {
        Self::new(EventType::PresenceUpdate, room_id, presence.user_id.clone())
            .with_presence(presence)
    }

    /// Create an `error` envelope
    #[must_use]
    pub fn error(room_id: RoomId, user_id: UserId, error: impl Into<String>) -> Self {
        let mut envelope = Self::new(EventType::Error, room_id, user_id);
        envelope.error = Some(error.into());
        envelope
    }

    /// Attach a message payload
    #[must_use]
    pub fn with_message(mut self, message: serde_json::Value) -> Self {
        self.message = Some(message);
        self
    }

    /// Attach a presence payload
    #[must_use]
    pub fn with_presence(mut self, presence: PresenceRecord) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Attach a free-form payload
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
