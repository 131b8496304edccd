//! Events broadcast over pub/sub

mod envelope;

pub use envelope::{EventEnvelope, EventType};
