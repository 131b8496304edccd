//! Test helpers for integration tests
//!
//! A [`TestCluster`] is a set of realtime services, one per simulated server
//! process, all wired to the same in-memory store and broker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use realtime_cache::{MemoryStore, PubSubChannel, ReceivedMessage};
use realtime_common::{AppConfig, ConfigError};
use realtime_core::EventEnvelope;
use realtime_service::RealtimeService;
use tokio::sync::broadcast;

/// How long a listener waits for an envelope before giving up
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Several simulated server processes sharing one store
pub struct TestCluster {
    pub store: Arc<MemoryStore>,
    nodes: Vec<RealtimeService>,
}

impl TestCluster {
    /// Start a cluster with `size` nodes
    pub fn start(size: usize) -> Self {
        let store = Arc::new(MemoryStore::new());
        let nodes = (0..size)
            .map(|_| RealtimeService::from_store(store.clone()))
            .collect();
        Self { store, nodes }
    }

    /// Get one node
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn node(&self, index: usize) -> &RealtimeService {
        &self.nodes[index]
    }

    /// Subscribe to a channel the way a connection manager would
    pub fn listen(&self, channel: PubSubChannel) -> Listener {
        Listener {
            rx: self.store.subscribe(&channel),
            channel,
        }
    }
}

/// Receives envelopes from one channel
pub struct Listener {
    channel: PubSubChannel,
    rx: broadcast::Receiver<ReceivedMessage>,
}

impl Listener {
    /// Wait for the next envelope
    pub async fn next_envelope(&mut self) -> Result<EventEnvelope> {
        let msg = tokio::time::timeout(RECEIVE_TIMEOUT, self.rx.recv())
            .await
            .map_err(|_| anyhow!("no envelope on {} within {RECEIVE_TIMEOUT:?}", self.channel))??;
        msg.envelope
            .ok_or_else(|| anyhow!("payload on {} is not an envelope: {}", self.channel, msg.payload))
    }

    /// Assert nothing is waiting on this channel
    pub fn assert_silent(&mut self) -> Result<()> {
        match self.rx.try_recv() {
            Err(broadcast::error::TryRecvError::Empty) => Ok(()),
            Ok(msg) => bail!("unexpected message on {}: {}", self.channel, msg.payload),
            Err(e) => bail!("listener on {} broken: {e}", self.channel),
        }
    }
}

/// Load config for Redis-backed tests, or `None` when no Redis is configured
pub fn redis_test_config() -> Option<AppConfig> {
    let _ = dotenvy::dotenv();
    match AppConfig::from_env() {
        Ok(config) => Some(config),
        Err(ConfigError::MissingVar(var)) => {
            eprintln!("Skipping Redis test: {var} not set");
            None
        }
        Err(e) => {
            eprintln!("Skipping Redis test: {e}");
            None
        }
    }
}
