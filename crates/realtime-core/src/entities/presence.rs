//! User presence.
//!
//! A presence record is short-lived state: it expires unless refreshed, and a
//! missing record means the user is offline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{RoomId, UserId};

/// User availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// User is connected and active
    Online,
    /// Do not disturb
    Busy,
    /// User is idle (away from keyboard)
    Away,
    /// Connected, but shown to others as offline
    Invisible,
    /// Not connected
    #[default]
    Offline,
}

impl PresenceStatus {
    /// Check if this status should be visible to others
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Invisible | Self::Offline)
    }

    /// Check if this status counts towards the online membership set
    #[must_use]
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }

    /// Status as observed by other users
    #[must_use]
    pub fn public(self) -> Self {
        match self {
            Self::Invisible => Self::Offline,
            other => other,
        }
    }

    /// Get the wire name of this status
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Busy => "busy",
            Self::Away => "away",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing a presence status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid presence status: {0}")]
pub struct StatusParseError(String);

impl std::str::FromStr for PresenceStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "busy" => Ok(Self::Busy),
            "away" => Ok(Self::Away),
            "invisible" => Ok(Self::Invisible),
            "offline" => Ok(Self::Offline),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

/// Presence state of a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    /// User ID
    pub user_id: UserId,
    /// Current status
    pub status: PresenceStatus,
    /// Room the user is currently focused on (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Last write (status change or heartbeat)
    pub last_seen: DateTime<Utc>,
}

impl PresenceRecord {
    /// Create a new record stamped with the current time
    #[must_use]
    pub fn new(user_id: UserId, status: PresenceStatus) -> Self {
        Self {
            user_id,
            status,
            room_id: None,
            last_seen: Utc::now(),
        }
    }

    /// Synthetic record for a user with no stored presence
    #[must_use]
    pub fn offline(user_id: UserId) -> Self {
        Self::new(user_id, PresenceStatus::Offline)
    }

    /// Set the room
    #[must_use]
    pub fn with_room(mut self, room_id: Option<RoomId>) -> Self {
        self.room_id = room_id;
        self
    }

    /// Update timestamp
    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }

    /// Copy of this record as other users should see it
    #[must_use]
    pub fn public_view(&self) -> Self {
        Self {
            status: self.status.public(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(PresenceStatus::Online.to_string(), "online");
        assert_eq!(PresenceStatus::Busy.to_string(), "busy");
        assert_eq!(PresenceStatus::Away.to_string(), "away");
        assert_eq!(PresenceStatus::Invisible.to_string(), "invisible");
        assert_eq!(PresenceStatus::Offline.to_string(), "offline");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("online".parse::<PresenceStatus>().unwrap(), PresenceStatus::Online);
        assert_eq!("BUSY".parse::<PresenceStatus>().unwrap(), PresenceStatus::Busy);
        assert_eq!("Invisible".parse::<PresenceStatus>().unwrap(), PresenceStatus::Invisible);
        assert!("dnd".parse::<PresenceStatus>().is_err());
    }

    #[test]
    fn test_status_visibility() {
        assert!(PresenceStatus::Online.is_visible());
        assert!(PresenceStatus::Busy.is_visible());
        assert!(PresenceStatus::Away.is_visible());
        assert!(!PresenceStatus::Invisible.is_visible());
        assert!(!PresenceStatus::Offline.is_visible());

        assert!(PresenceStatus::Online.is_online());
        assert!(!PresenceStatus::Away.is_online());
        assert_eq!(PresenceStatus::default(), PresenceStatus::Offline);
    }

    #[test]
    fn test_public_view_masks_invisible() {
        let record = PresenceRecord::new(UserId::from("alice"), PresenceStatus::Invisible);
        let public = record.public_view();

        assert_eq!(public.status, PresenceStatus::Offline);
        assert_eq!(public.user_id, record.user_id);
        assert_eq!(public.last_seen, record.last_seen);
    }

    #[test]
    fn test_record_serialization() {
        let record = PresenceRecord::new(UserId::from("alice"), PresenceStatus::Away)
            .with_room(Some(RoomId::from("r1")));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["user_id"], "alice");
        assert_eq!(json["status"], "away");
        assert_eq!(json["room_id"], "r1");

        let roomless = PresenceRecord::offline(UserId::from("bob"));
        let json = serde_json::to_value(&roomless).unwrap();
        assert!(json.get("room_id").is_none());

        let back: PresenceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, roomless);
    }
}
