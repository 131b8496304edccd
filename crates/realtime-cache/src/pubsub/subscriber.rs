//! Redis Pub/Sub subscriber.
//!
//! Keeps one dedicated pub/sub connection per process and re-broadcasts every
//! received envelope to local listeners (typically the connection writer that
//! forwards envelopes to attached WebSocket clients). Envelopes published
//! while the connection is down are lost; clients reconcile through
//! snapshots, not through this subscriber.

use futures_util::StreamExt;
use realtime_core::{EventEnvelope, RoomId, UserId};
use redis::Client;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::pubsub::PubSubChannel;

/// Error type for subscriber operations
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for subscriber operations
pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// Message received from Pub/Sub
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Channel the message was received on
    pub channel: PubSubChannel,
    /// Parsed envelope (if the payload is a valid envelope)
    pub envelope: Option<EventEnvelope>,
    /// Raw payload
    pub payload: String,
}

impl ReceivedMessage {
    /// Build from a channel name and raw payload
    pub(crate) fn from_payload(channel_name: String, payload: String) -> Self {
        let channel = PubSubChannel::parse(&channel_name);
        let envelope = EventEnvelope::from_json(&payload).ok();

        Self {
            channel,
            envelope,
            payload,
        }
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Channel buffer size for local broadcast
    pub broadcast_buffer: usize,
    /// Reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

impl SubscriberConfig {
    /// Build from realtime-common settings
    #[must_use]
    pub fn from_settings(
        redis: &realtime_common::RedisConfig,
        settings: &realtime_common::SubscriberSettings,
    ) -> Self {
        Self {
            redis_url: redis.url.clone(),
            broadcast_buffer: settings.broadcast_buffer,
            reconnect_delay_ms: settings.reconnect_delay_ms,
        }
    }
}

/// Commands for subscription management
#[derive(Debug)]
enum SubscriberCommand {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Shutdown,
}

/// Redis Pub/Sub subscriber
pub struct Subscriber {
    /// Currently subscribed channels
    subscribed: Arc<RwLock<HashSet<String>>>,
    /// Local fanout of received messages
    broadcast_tx: broadcast::Sender<ReceivedMessage>,
    /// Control channel for subscription management
    control_tx: mpsc::Sender<SubscriberCommand>,
}

impl Subscriber {
    /// Create a new subscriber and start the background listener
    pub fn new(config: SubscriberConfig) -> SubscriberResult<Self> {
        // Validate the URL up front; the listener connects lazily.
        let client = Client::open(config.redis_url.as_str())?;
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_buffer);
        let (control_tx, control_rx) = mpsc::channel(32);
        let subscribed = Arc::new(RwLock::new(HashSet::new()));

        tokio::spawn(Self::listener_loop(
            client,
            config.reconnect_delay_ms,
            subscribed.clone(),
            broadcast_tx.clone(),
            control_rx,
        ));

        Ok(Self {
            subscribed,
            broadcast_tx,
            control_tx,
        })
    }

    /// Background listener loop; reconnects until shut down
    async fn listener_loop(
        client: Client,
        reconnect_delay_ms: u64,
        subscribed: Arc<RwLock<HashSet<String>>>,
        broadcast_tx: broadcast::Sender<ReceivedMessage>,
        mut control_rx: mpsc::Receiver<SubscriberCommand>,
    ) {
        loop {
            match Self::run_listener(&client, &subscribed, &broadcast_tx, &mut control_rx).await {
                Ok(true) => {
                    tracing::info!("Subscriber shutting down");
                    break;
                }
                Ok(false) => {
                    tracing::warn!("Pub/Sub stream ended, reconnecting");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Subscriber error, reconnecting");
                }
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(reconnect_delay_ms)).await;
        }
    }

    /// Run the listener until error, stream end (`Ok(false)`) or shutdown (`Ok(true)`)
    async fn run_listener(
        client: &Client,
        subscribed: &Arc<RwLock<HashSet<String>>>,
        broadcast_tx: &broadcast::Sender<ReceivedMessage>,
        control_rx: &mut mpsc::Receiver<SubscriberCommand>,
    ) -> SubscriberResult<bool> {
        let mut pubsub = client.get_async_pubsub().await?;

        // Restore subscriptions after a reconnect
        {
            let channels = subscribed.read().await;
            for channel in channels.iter() {
                pubsub.subscribe(channel).await?;
            }
        }

        tracing::info!("Subscriber connected to Redis");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                msg = stream.next() => {
                    let Some(msg) = msg else {
                        return Ok(false);
                    };
                    let channel_name = msg.get_channel_name().to_string();
                    let payload: String = msg.get_payload().unwrap_or_default();

                    tracing::trace!(channel = %channel_name, "Received Pub/Sub message");

                    // No local listeners is not an error
                    let _ = broadcast_tx.send(ReceivedMessage::from_payload(channel_name, payload));
                }

                cmd = control_rx.recv() => {
                    match cmd {
                        Some(SubscriberCommand::Subscribe(channels)) => {
                            // The message stream borrows the connection
                            drop(stream);
                            for channel in channels {
                                match pubsub.subscribe(&channel).await {
                                    Ok(()) => {
                                        tracing::debug!(channel = %channel, "Subscribed to channel");
                                        subscribed.write().await.insert(channel);
                                    }
                                    Err(e) => {
                                        tracing::error!(channel = %channel, error = %e, "Failed to subscribe");
                                    }
                                }
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Unsubscribe(channels)) => {
                            drop(stream);
                            for channel in channels {
                                match pubsub.unsubscribe(&channel).await {
                                    Ok(()) => {
                                        tracing::debug!(channel = %channel, "Unsubscribed from channel");
                                        subscribed.write().await.remove(&channel);
                                    }
                                    Err(e) => {
                                        tracing::error!(channel = %channel, error = %e, "Failed to unsubscribe");
                                    }
                                }
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Shutdown) | None => return Ok(true),
                    }
                }
            }
        }
    }

    async fn send(&self, command: SubscriberCommand) -> SubscriberResult<()> {
        self.control_tx
            .send(command)
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }

    /// Subscribe to channels
    pub async fn subscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        let names = channels.iter().map(PubSubChannel::name).collect();
        self.send(SubscriberCommand::Subscribe(names)).await
    }

    /// Unsubscribe from channels
    pub async fn unsubscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        let names = channels.iter().map(PubSubChannel::name).collect();
        self.send(SubscriberCommand::Unsubscribe(names)).await
    }

    /// Subscribe to a room's events
    pub async fn subscribe_room(&self, room_id: RoomId) -> SubscriberResult<()> {
        self.subscribe(&[PubSubChannel::room(room_id)]).await
    }

    /// Subscribe to a user's events
    pub async fn subscribe_user(&self, user_id: UserId) -> SubscriberResult<()> {
        self.subscribe(&[PubSubChannel::user(user_id)]).await
    }

    /// Get a receiver for broadcast messages
    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Get currently subscribed channels
    pub async fn subscribed_channels(&self) -> Vec<String> {
        self.subscribed.read().await.iter().cloned().collect()
    }

    /// Shutdown the subscriber
    pub async fn shutdown(&self) -> SubscriberResult<()> {
        self.send(SubscriberCommand::Shutdown).await
    }
}

/// Builder for subscriber
pub struct SubscriberBuilder {
    config: SubscriberConfig,
    initial_channels: Vec<PubSubChannel>,
}

impl SubscriberBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SubscriberConfig::default(),
            initial_channels: Vec::new(),
        }
    }

    /// Start from an existing configuration
    #[must_use]
    pub fn with_config(config: SubscriberConfig) -> Self {
        Self {
            config,
            initial_channels: Vec::new(),
        }
    }

    /// Set Redis URL
    #[must_use]
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = url.into();
        self
    }

    /// Set broadcast buffer size
    #[must_use]
    pub fn broadcast_buffer(mut self, size: usize) -> Self {
        self.config.broadcast_buffer = size;
        self
    }

    /// Set reconnection delay
    #[must_use]
    pub fn reconnect_delay_ms(mut self, delay: u64) -> Self {
        self.config.reconnect_delay_ms = delay;
        self
    }

    /// Add initial channel subscription
    #[must_use]
    pub fn subscribe(mut self, channel: PubSubChannel) -> Self {
        self.initial_channels.push(channel);
        self
    }

    /// Build and start the subscriber
    pub async fn build(self) -> SubscriberResult<Subscriber> {
        let subscriber = Subscriber::new(self.config)?;

        if !self.initial_channels.is_empty() {
            subscriber.subscribe(&self.initial_channels).await?;
        }

        Ok(subscriber)
    }
}

impl Default for SubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}
