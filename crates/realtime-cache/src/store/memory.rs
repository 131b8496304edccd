//! In-memory implementation of the store port.
//!
//! Stands in for Redis in tests and single-process setups. Several trackers
//! (or several simulated server processes) can share one `Arc<MemoryStore>`.
//! Deadlines use `tokio::time::Instant`, so tests can pause and advance the
//! clock to observe TTL expiry. Per-key updates go through `DashMap` entries,
//! which makes each operation atomic for its key just like a Redis command.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::{StoreError, StorePort, StoreResult};
use crate::pubsub::{PubSubChannel, ReceivedMessage};

/// Default per-channel buffer for local subscribers
const CHANNEL_BUFFER: usize = 1024;

#[derive(Debug)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

#[derive(Debug)]
struct ExpiringSet {
    members: HashMap<String, Instant>,
    expires_at: Instant,
}

impl ExpiringSet {
    fn is_live(&self, member: &str, now: Instant) -> bool {
        self.expires_at > now && self.members.get(member).is_some_and(|d| *d > now)
    }
}

/// In-memory store and broker
pub struct MemoryStore {
    values: DashMap<String, StoredValue>,
    sets: DashMap<String, ExpiringSet>,
    channels: DashMap<String, broadcast::Sender<ReceivedMessage>>,
    unavailable: AtomicBool,
    failing_channels: DashSet<String>,
    channel_buffer: usize,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("values", &self.values.len())
            .field("sets", &self.sets.len())
            .field("channels", &self.channels.len())
            .field("unavailable", &self.unavailable.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::with_channel_buffer(CHANNEL_BUFFER)
    }

    /// Create an empty store with a custom per-channel subscriber buffer
    #[must_use]
    pub fn with_channel_buffer(channel_buffer: usize) -> Self {
        Self {
            values: DashMap::new(),
            sets: DashMap::new(),
            channels: DashMap::new(),
            unavailable: AtomicBool::new(false),
            failing_channels: DashSet::new(),
            channel_buffer,
        }
    }

    /// Subscribe to a channel.
    ///
    /// Like Redis pub/sub, only messages published after this call are received.
    pub fn subscribe(&self, channel: &PubSubChannel) -> broadcast::Receiver<ReceivedMessage> {
        self.channels
            .entry(channel.name())
            .or_insert_with(|| broadcast::channel(self.channel_buffer).0)
            .subscribe()
    }

    /// Simulate a store/broker outage: every operation fails while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make publishes to one channel fail
    pub fn fail_channel(&self, channel: &PubSubChannel) {
        self.failing_channels.insert(channel.name());
    }

    /// Undo [`MemoryStore::fail_channel`]
    pub fn restore_channel(&self, channel: &PubSubChannel) {
        self.failing_channels.remove(&channel.name());
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorePort for MemoryStore {
    async fn set_value(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.ensure_available()?;
        self.values.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn set_value_if_exists(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        self.ensure_available()?;
        let now = Instant::now();
        match self.values.get_mut(key) {
            Some(mut entry) if entry.expires_at > now => {
                entry.value = value.to_string();
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_value(&self, key: &str) -> StoreResult<Option<String>> {
        self.ensure_available()?;
        let now = Instant::now();
        // The map guard must be released before `remove_if` touches the same shard.
        let live = self
            .values
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));

        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.values.remove_if(key, |_, entry| entry.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete_many(&self, keys: &[&str]) -> StoreResult<u64> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut deleted = 0;
        for key in keys {
            if let Some((_, entry)) = self.values.remove(*key) {
                if entry.expires_at > now {
                    deleted += 1;
                }
            }
            if let Some((_, set)) = self.sets.remove(*key) {
                if set.expires_at > now {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| StoredValue {
                value: "0".to_string(),
                expires_at: now,
            });

        let current = if entry.expires_at > now {
            entry.value.parse::<i64>().map_err(|_| {
                StoreError::InvalidReply(format!("value at {key} is not an integer"))
            })?
        } else {
            0
        };

        let next = current + 1;
        entry.value = next.to_string();
        entry.expires_at = now + ttl;
        Ok(next)
    }

    async fn expiring_add(&self, key: &str, member: &str, ttl: Duration) -> StoreResult<()> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut set = self
            .sets
            .entry(key.to_string())
            .or_insert_with(|| ExpiringSet {
                members: HashMap::new(),
                expires_at: now,
            });

        if set.expires_at <= now {
            set.members.clear();
        }
        set.members.insert(member.to_string(), now + ttl);
        set.expires_at = now + ttl;
        Ok(())
    }

    async fn expiring_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.ensure_available()?;
        let now = Instant::now();
        let removed = match self.sets.get_mut(key) {
            Some(mut set) => {
                let was_live = set.is_live(member, now);
                set.members.remove(member);
                was_live
            }
            None => false,
        };
        // Redis drops a sorted set once its last member is gone.
        self.sets.remove_if(key, |_, set| set.members.is_empty());
        Ok(removed)
    }

    async fn expiring_members(&self, key: &str) -> StoreResult<Vec<String>> {
        self.ensure_available()?;
        let now = Instant::now();
        let Some(set) = self.sets.get(key) else {
            return Ok(Vec::new());
        };
        if set.expires_at <= now {
            return Ok(Vec::new());
        }

        let mut live: Vec<(Instant, &String)> = set
            .members
            .iter()
            .filter(|(_, deadline)| **deadline > now)
            .map(|(member, deadline)| (*deadline, member))
            .collect();
        // Same order as ZRANGEBYSCORE: by deadline, then by member.
        live.sort();
        Ok(live.into_iter().map(|(_, member)| member.clone()).collect())
    }

    async fn expiring_contains(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.ensure_available()?;
        let now = Instant::now();
        Ok(self.sets.get(key).is_some_and(|set| set.is_live(member, now)))
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<u32> {
        self.ensure_available()?;
        if self.failing_channels.contains(channel) {
            return Err(StoreError::Unavailable(format!(
                "publish to {channel} rejected"
            )));
        }

        let receivers = match self.channels.get(channel) {
            Some(sender) => sender
                .send(ReceivedMessage::from_payload(
                    channel.to_string(),
                    payload.to_string(),
                ))
                .unwrap_or(0),
            None => 0,
        };
        if receivers == 0 {
            // Every receiver is gone; drop the sender with them.
            self.channels
                .remove_if(channel, |_, sender| sender.receiver_count() == 0);
        }
        Ok(u32::try_from(receivers).unwrap_or(u32::MAX))
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.ensure_available()
    }
}
