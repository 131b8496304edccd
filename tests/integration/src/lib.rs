//! Integration test utilities for the realtime subsystem
//!
//! Simulates several server processes sharing one store and broker, and
//! provides the Redis environment check used by the Redis-backed tests.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
