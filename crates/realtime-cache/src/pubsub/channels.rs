//! Pub/Sub channel definitions.
//!
//! Defines the channel naming conventions shared by every server process.

use realtime_core::{RoomId, UserId};

/// Channel prefix for room events (all members of a room)
pub const ROOM_CHANNEL_PREFIX: &str = "room:";
/// Channel prefix for user-specific events (all sessions of a user)
pub const USER_CHANNEL_PREFIX: &str = "user:";

/// Pub/Sub channel types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PubSubChannel {
    /// Events for a specific room
    Room(RoomId),
    /// Events for a specific user, wherever they are connected
    User(UserId),
    /// Any other channel name
    Custom(String),
}

impl PubSubChannel {
    /// Create a room channel
    #[must_use]
    pub fn room(room_id: RoomId) -> Self {
        Self::Room(room_id)
    }

    /// Create a user channel
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self::User(user_id)
    }

    /// Create a custom channel
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Get the broker channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Room(id) => format!("{ROOM_CHANNEL_PREFIX}{id}"),
            Self::User(id) => format!("{USER_CHANNEL_PREFIX}{id}"),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Parse a channel name back to a `PubSubChannel`
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if let Some(id) = name.strip_prefix(ROOM_CHANNEL_PREFIX) {
            if let Ok(room_id) = RoomId::parse(id) {
                return Self::Room(room_id);
            }
        }

        if let Some(id) = name.strip_prefix(USER_CHANNEL_PREFIX) {
            if let Ok(user_id) = UserId::parse(id) {
                return Self::User(user_id);
            }
        }

        Self::Custom(name.to_string())
    }
}

impl std::fmt::Display for PubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(PubSubChannel::room(RoomId::from("r1")).name(), "room:r1");
        assert_eq!(PubSubChannel::user(UserId::from("alice")).name(), "user:alice");
        assert_eq!(PubSubChannel::custom("ops").name(), "ops");
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!(
            PubSubChannel::parse("room:r1"),
            PubSubChannel::Room(RoomId::from("r1"))
        );
        assert_eq!(
            PubSubChannel::parse("user:alice"),
            PubSubChannel::User(UserId::from("alice"))
        );
        assert_eq!(
            PubSubChannel::parse("room:"),
            PubSubChannel::Custom("room:".to_string())
        );
        assert_eq!(
            PubSubChannel::parse("guild:123"),
            PubSubChannel::Custom("guild:123".to_string())
        );
    }
}
