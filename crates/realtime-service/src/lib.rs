//! # realtime-service
//!
//! Application layer for realtime presence, typing indicators and unread
//! counters. Connection managers, the message store and the REST layer call
//! into [`RealtimeService`]; [`node`] runs a standalone listener process.

pub mod context;
pub mod node;
pub mod service;

pub use context::RealtimeContext;
pub use service::RealtimeService;
