//! Unread counter module.

mod counter;

pub use counter::{UnreadCounterStore, UNREAD_TTL};
