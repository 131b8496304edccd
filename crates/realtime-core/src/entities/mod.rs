//! Domain entities

mod presence;

pub use presence::{PresenceRecord, PresenceStatus, StatusParseError};
