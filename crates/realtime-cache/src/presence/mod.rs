//! Presence module.
//!
//! Tracks user online status with TTL-based expiry.

mod tracker;

pub use tracker::{PresenceTracker, ONLINE_USERS_KEY, PRESENCE_TTL};
