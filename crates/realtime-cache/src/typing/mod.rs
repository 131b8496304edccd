//! Typing indicator module.

mod tracker;

pub use tracker::{TypingIndicatorTracker, TYPING_TTL};
