//! # realtime-core
//!
//! Domain layer for the realtime subsystem: user and room identifiers,
//! presence records, and the event envelope broadcast over pub/sub.
//! This crate has zero dependencies on infrastructure (Redis, runtime, etc.).

pub mod entities;
pub mod events;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{PresenceRecord, PresenceStatus, StatusParseError};
pub use events::{EventEnvelope, EventType};
pub use value_objects::{IdParseError, RoomId, UserId};
