//! Realtime Integration Tests
//!
//! Most scenarios run several simulated server processes over one in-memory
//! store. The Redis tests at the bottom need a running Redis instance and
//! `REDIS_URL`; they skip themselves otherwise.
//!
//! Run with: cargo test -p integration-tests --test realtime_tests

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use integration_tests::{
    message_payload, redis_test_config, unique_room, unique_user, TestCluster,
};
use realtime_cache::{
    PubSubChannel, RedisStore, StorePort, SubscriberBuilder, SubscriberConfig, PRESENCE_TTL,
};
use realtime_core::{EventType, PresenceStatus, RoomId, UserId};
use realtime_service::RealtimeService;

// ============================================================================
// Presence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_presence_visible_across_nodes_until_ttl() -> Result<()> {
    let cluster = TestCluster::start(2);
    let (a, b) = (UserId::from("A"), UserId::from("B"));
    let r1 = RoomId::from("r1");

    cluster.node(0).on_connect(&a, Some(&r1)).await;
    cluster.node(1).on_connect(&b, Some(&r1)).await;

    let online = cluster.node(1).list_online().await?;
    assert!(online.contains(&a));

    // B keeps heartbeating, A goes silent.
    tokio::time::advance(Duration::from_secs(150)).await;
    cluster.node(1).heartbeat(&b).await;
    tokio::time::advance(PRESENCE_TTL - Duration::from_secs(150)).await;

    let online = cluster.node(1).list_online().await?;
    assert!(!online.contains(&a));
    assert!(online.contains(&b));
    assert_eq!(
        cluster.node(1).presence(&a).await?.status,
        PresenceStatus::Offline
    );

    Ok(())
}

#[tokio::test]
async fn test_status_change_reaches_other_node() -> Result<()> {
    let cluster = TestCluster::start(2);
    let a = UserId::from("A");
    let r1 = RoomId::from("r1");
    let mut room = cluster.listen(PubSubChannel::room(r1.clone()));

    cluster.node(0).on_connect(&a, Some(&r1)).await;
    cluster
        .node(0)
        .update_status(&a, PresenceStatus::Invisible, Some(&r1))
        .await?;

    let connected = room.next_envelope().await?;
    assert_eq!(connected.presence.map(|p| p.status), Some(PresenceStatus::Online));

    let hidden = room.next_envelope().await?;
    assert_eq!(hidden.event_type, EventType::PresenceUpdate);
    assert_eq!(hidden.presence.map(|p| p.status), Some(PresenceStatus::Offline));

    // The user still sees their own real status.
    assert_eq!(
        cluster.node(1).presence(&a).await?.status,
        PresenceStatus::Invisible
    );
    assert!(cluster.node(1).list_online().await?.is_empty());

    Ok(())
}

// ============================================================================
// Fanout
// ============================================================================

#[tokio::test]
async fn test_new_message_fanout() -> Result<()> {
    let cluster = TestCluster::start(2);
    let (u, other) = (UserId::from("U"), UserId::from("V"));
    let (r, r2) = (RoomId::from("R"), RoomId::from("R2"));

    let mut room = cluster.listen(PubSubChannel::room(r.clone()));
    let mut sender = cluster.listen(PubSubChannel::user(u.clone()));
    let mut other_room = cluster.listen(PubSubChannel::room(r2));

    cluster
        .node(0)
        .on_message_persisted(&r, &u, message_payload("hello"), &[u.clone(), other.clone()])
        .await?;

    let on_room = room.next_envelope().await?;
    let on_user = sender.next_envelope().await?;
    assert_eq!(on_room.event_type, EventType::NewMessage);
    assert_eq!(on_room, on_user);
    other_room.assert_silent()?;

    assert_eq!(cluster.node(1).unread(&other, &r).await?, 1);
    assert_eq!(cluster.node(1).unread(&u, &r).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_typing_start_then_stop() -> Result<()> {
    let cluster = TestCluster::start(2);
    let bob = UserId::from("bob");
    let r1 = RoomId::from("r1");
    let mut room = cluster.listen(PubSubChannel::room(r1.clone()));

    cluster.node(0).set_typing(&r1, &bob, true).await?;
    assert_eq!(cluster.node(1).typing_users(&r1).await?, vec![bob.clone()]);
    cluster.node(0).set_typing(&r1, &bob, false).await?;

    let start = room.next_envelope().await?;
    let stop = room.next_envelope().await?;
    assert_eq!((start.event_type, stop.event_type), (EventType::TypingStart, EventType::TypingStop));
    assert_eq!(start.user_id, bob);
    assert!(start.timestamp <= stop.timestamp);
    assert!(cluster.node(1).typing_users(&r1).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_disconnect_cleans_up_on_every_node() -> Result<()> {
    let cluster = TestCluster::start(2);
    let a = UserId::from("A");
    let (r1, r2) = (RoomId::from("r1"), RoomId::from("r2"));

    cluster.node(0).on_connect(&a, Some(&r1)).await;
    cluster.node(0).set_typing(&r2, &a, true).await?;

    let mut room = cluster.listen(PubSubChannel::room(r2.clone()));
    cluster.node(0).on_disconnect(&a, &[r1.clone(), r2.clone()]).await;

    assert_eq!(room.next_envelope().await?.event_type, EventType::TypingStop);
    let offline = room.next_envelope().await?;
    assert_eq!(offline.presence.map(|p| p.status), Some(PresenceStatus::Offline));

    assert!(cluster.node(1).list_online().await?.is_empty());
    assert!(cluster.node(1).typing_users(&r2).await?.is_empty());

    Ok(())
}

// ============================================================================
// Unread
// ============================================================================

#[tokio::test]
async fn test_concurrent_messages_from_many_nodes() -> Result<()> {
    let cluster = Arc::new(TestCluster::start(4));
    let reader = UserId::from("reader");
    let room = RoomId::from("busy");

    let mut handles = Vec::new();
    for i in 0..100 {
        let cluster = cluster.clone();
        let (reader, room) = (reader.clone(), room.clone());
        handles.push(tokio::spawn(async move {
            let sender = UserId::new(format!("sender-{i}"));
            cluster
                .node(i % 4)
                .on_message_persisted(&room, &sender, message_payload("hi"), &[reader, sender.clone()])
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(cluster.node(0).unread(&reader, &room).await?, 100);

    assert!(cluster.node(2).mark_read(&reader, &room).await?);
    assert_eq!(cluster.node(3).unread(&reader, &room).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_outage_surfaces_on_queries_only() -> Result<()> {
    let cluster = TestCluster::start(1);
    let a = UserId::from("A");
    cluster.store.set_unavailable(true);

    // Mutation hooks keep going.
    cluster.node(0).on_connect(&a, None).await;
    cluster.node(0).heartbeat(&a).await;

    // Queries report the outage instead of "offline" or "zero".
    assert!(cluster.node(0).presence(&a).await.is_err());
    assert!(cluster.node(0).unread(&a, &RoomId::from("r1")).await.is_err());

    cluster.store.set_unavailable(false);
    assert_eq!(cluster.node(0).presence(&a).await?.status, PresenceStatus::Offline);

    Ok(())
}

// ============================================================================
// Redis
// ============================================================================

#[tokio::test]
async fn test_redis_presence_and_unread() -> Result<()> {
    let Some(config) = redis_test_config() else {
        return Ok(());
    };

    let store = Arc::new(RedisStore::from_config(&config.redis)?);
    store.health_check().await?;
    let service = RealtimeService::from_store(store);

    let (user, room) = (unique_user("alice"), unique_room("general"));
    service.on_connect(&user, Some(&room)).await;
    assert_eq!(service.presence(&user).await?.status, PresenceStatus::Online);
    assert!(service.list_online().await?.contains(&user));

    service.on_message_persisted(&room, &unique_user("bob"), message_payload("hi"), &[user.clone()]).await?;
    assert_eq!(service.unread(&user, &room).await?, 1);
    assert!(service.mark_read(&user, &room).await?);
    assert_eq!(service.unread(&user, &room).await?, 0);

    service.on_disconnect(&user, &[room]).await;
    assert!(!service.list_online().await?.contains(&user));

    Ok(())
}

#[tokio::test]
async fn test_redis_subscriber_receives_typing() -> Result<()> {
    let Some(config) = redis_test_config() else {
        return Ok(());
    };

    let store = Arc::new(RedisStore::from_config(&config.redis)?);
    let service = RealtimeService::from_store(store);
    let (user, room) = (unique_user("typist"), unique_room("typing"));
    let channel = PubSubChannel::room(room.clone());

    let subscriber = SubscriberBuilder::with_config(SubscriberConfig::from_settings(
        &config.redis,
        &config.subscriber,
    ))
    .subscribe(channel.clone())
    .build()
    .await?;
    let mut rx = subscriber.receiver();

    // Subscription is confirmed asynchronously by the listener task.
    let wait = async {
        while !subscriber.subscribed_channels().await.contains(&channel.name()) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait).await?;

    service.set_typing(&room, &user, true).await?;

    let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await??;
    assert_eq!(msg.channel, channel);
    let envelope = msg.envelope.expect("typing envelope");
    assert_eq!(envelope.event_type, EventType::TypingStart);
    assert_eq!(envelope.user_id, user);

    subscriber.shutdown().await?;
    Ok(())
}
