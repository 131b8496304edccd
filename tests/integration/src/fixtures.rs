//! Test fixtures and data generators
//!
//! Redis-backed tests share one server, so every id carries a unique suffix.

use realtime_core::{RoomId, UserId};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A user id unique to this test run
pub fn unique_user(name: &str) -> UserId {
    UserId::new(format!("{name}-{}-{}", std::process::id(), unique_suffix()))
}

/// A room id unique to this test run
pub fn unique_room(name: &str) -> RoomId {
    RoomId::new(format!("{name}-{}-{}", std::process::id(), unique_suffix()))
}

/// A stored message as the durable message store would hand it over
pub fn message_payload(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": format!("msg-{}", unique_suffix()),
        "content": content,
    })
}
