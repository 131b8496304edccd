//! Realtime node
//!
//! Connects to the shared store, subscribes to the configured channels and
//! logs every envelope it receives until shutdown.

use std::sync::Arc;

use anyhow::Context as _;
use realtime_cache::{PubSubChannel, RedisStore, StorePort, SubscriberBuilder, SubscriberConfig};
use realtime_common::AppConfig;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::RealtimeService;

/// Run the node until Ctrl-C
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let store = RedisStore::from_config(&config.redis).context("failed to create Redis pool")?;
    store
        .health_check()
        .await
        .context("Redis health check failed")?;

    info!(
        max_connections = config.redis.max_connections,
        "Connected to Redis"
    );

    let service = RealtimeService::from_store(Arc::new(store));

    let channels = watch_channels(&config.subscriber.watch_channels);
    let mut builder = SubscriberBuilder::with_config(SubscriberConfig::from_settings(
        &config.redis,
        &config.subscriber,
    ));
    for channel in &channels {
        builder = builder.subscribe(channel.clone());
    }
    let subscriber = builder.build().await.context("failed to start subscriber")?;
    let mut messages = subscriber.receiver();

    info!(
        app = %config.app.name,
        channels = channels.len(),
        online = service.online_count().await.unwrap_or_default(),
        "Realtime node running"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            received = messages.recv() => match received {
                Ok(msg) => match msg.envelope {
                    Some(envelope) => info!(
                        channel = %msg.channel,
                        event_type = %envelope.event_type,
                        room_id = %envelope.room_id,
                        user_id = %envelope.user_id,
                        "Received envelope"
                    ),
                    None => warn!(channel = %msg.channel, "Received payload that is not an envelope"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Node fell behind, envelopes dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    subscriber.shutdown().await.ok();
    info!("Realtime node stopped");

    Ok(())
}

/// Parse configured channel names, skipping blanks
fn watch_channels(names: &[String]) -> Vec<PubSubChannel> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(PubSubChannel::parse)
        .collect()
}
