//! Background sync loop under virtual time.
//!
//! Every test runs with a paused tokio clock: time only moves when all tasks
//! are idle, so intervals and injected latency are exact.

use std::{sync::Arc, time::Duration};

use veil_client::{
    Channel, Collaborators, Composer, SyncCommand, SyncConfig, SyncHandle, SyncLoop, SyncUpdate,
};
use veil_core::{
    ChannelId, Environment, IdentityStore, RoomLink, SessionError, TransportError,
    storage::MemoryKeyStore,
};
use veil_crypto::encrypt;
use veil_harness::{SimEnv, SimServer};

fn spawn(server: &SimServer, env: &SimEnv, user_id: u64) -> SyncHandle {
    let identity = IdentityStore::new(MemoryKeyStore::new()).load_or_create(env).unwrap();
    let session = Arc::new(server.session(user_id));
    let collaborators = Collaborators::new(Arc::clone(&session), session);
    SyncLoop::spawn(env.clone(), identity, collaborators, SyncConfig::default())
}

async fn next_update(handle: &mut SyncHandle) -> SyncUpdate {
    tokio::time::timeout(Duration::from_secs(60), handle.updates.recv())
        .await
        .expect("no update within 60s")
        .expect("loop stopped")
}

/// Collect updates until none arrives for `quiet`.
async fn drain(handle: &mut SyncHandle, quiet: Duration) -> Vec<SyncUpdate> {
    let mut updates = Vec::new();
    while let Ok(Some(update)) = tokio::time::timeout(quiet, handle.updates.recv()).await {
        updates.push(update);
    }
    updates
}

async fn seed_room(server: &SimServer, env: &SimEnv, link: &RoomLink, texts: &[&str]) {
    for text in texts {
        let envelope = encrypt(text, link.key().key(), &mut env.rng()).unwrap();
        server.inject(ChannelId::Room(link.room_id()), 9, envelope).await;
    }
}

#[tokio::test(start_paused = true)]
async fn polls_immediately_then_every_interval() {
    let env = SimEnv::with_seed(1);
    let server = SimServer::new();
    let link = RoomLink::create("https://veil.example", &env);
    seed_room(&server, &env, &link, &["first"]).await;
    let mut handle = spawn(&server, &env, 1);
    let channel = ChannelId::Room(link.room_id());

    handle.commands.send(SyncCommand::Open(Channel::room(&link))).await.unwrap();

    let SyncUpdate::Timeline { entries, .. } = next_update(&mut handle).await else {
        panic!("expected the cleared timeline first");
    };
    assert!(entries.is_empty());
    let SyncUpdate::Timeline { entries, .. } = next_update(&mut handle).await else {
        panic!("expected the first poll's timeline");
    };
    assert_eq!(entries[0].body.plaintext(), Some("first"));
    assert_eq!(server.list_calls(channel).await, 1);

    tokio::time::sleep(Duration::from_millis(4_500)).await;
    assert_eq!(server.list_calls(channel).await, 3);

    handle.commands.send(SyncCommand::Focus).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(server.list_calls(channel).await, 4);
}

#[tokio::test(start_paused = true)]
async fn switch_discards_slow_poll_of_previous_room() {
    let env = SimEnv::with_seed(2);
    let server = SimServer::new();
    let slow = RoomLink::create("https://veil.example", &env);
    let fast = RoomLink::create("https://veil.example", &env);
    seed_room(&server, &env, &slow, &["from slow room"]).await;
    seed_room(&server, &env, &fast, &["from fast room"]).await;
    server.set_channel_latency(ChannelId::Room(slow.room_id()), Duration::from_secs(5)).await;
    let mut handle = spawn(&server, &env, 1);

    handle.commands.send(SyncCommand::Open(Channel::room(&slow))).await.unwrap();
    handle.commands.send(SyncCommand::Open(Channel::room(&fast))).await.unwrap();

    let updates = drain(&mut handle, Duration::from_secs(12)).await;

    let fast_channel = ChannelId::Room(fast.room_id());
    let mut saw_fast_message = false;
    for update in &updates {
        let SyncUpdate::Timeline { channel, entries } = update else {
            panic!("unexpected update {update:?}");
        };
        if *channel != fast_channel {
            assert!(entries.is_empty(), "slow room result was applied");
            continue;
        }
        for entry in entries {
            assert_eq!(entry.body.plaintext(), Some("from fast room"));
            saw_fast_message = true;
        }
    }
    assert!(saw_fast_message);
}

#[tokio::test(start_paused = true)]
async fn failed_send_hands_draft_back() {
    let env = SimEnv::with_seed(3);
    let server = SimServer::new();
    let link = RoomLink::create("https://veil.example", &env);
    let mut handle = spawn(&server, &env, 1);
    handle.commands.send(SyncCommand::Open(Channel::room(&link))).await.unwrap();
    next_update(&mut handle).await;

    let mut composer = Composer::new();
    composer.set("important");
    server.fail_next_creates(1).await;
    let plaintext = composer.take().unwrap();
    handle.commands.send(SyncCommand::Send { plaintext }).await.unwrap();

    let SyncUpdate::SendFailed { plaintext, error, .. } = next_update(&mut handle).await else {
        panic!("expected SendFailed");
    };
    assert!(matches!(error, SessionError::Transport(_)));
    composer.restore(plaintext);
    assert_eq!(composer.draft(), "important");

    let plaintext = composer.take().unwrap();
    handle.commands.send(SyncCommand::Send { plaintext }).await.unwrap();
    assert!(matches!(next_update(&mut handle).await, SyncUpdate::Sent { .. }));
    let SyncUpdate::Timeline { entries, .. } = next_update(&mut handle).await else {
        panic!("expected timeline after send");
    };
    assert_eq!(entries.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn outage_reports_transport_failure_then_recovers() {
    let env = SimEnv::with_seed(4);
    let server = SimServer::new();
    let link = RoomLink::create("https://veil.example", &env);
    seed_room(&server, &env, &link, &["after outage"]).await;
    server.set_offline(true).await;
    let mut handle = spawn(&server, &env, 1);

    handle.commands.send(SyncCommand::Open(Channel::room(&link))).await.unwrap();
    next_update(&mut handle).await;

    assert!(matches!(next_update(&mut handle).await, SyncUpdate::TransportFailure { .. }));

    server.set_offline(false).await;
    let updates = drain(&mut handle, Duration::from_secs(5)).await;

    assert!(updates.iter().any(|update| matches!(
        update,
        SyncUpdate::Timeline { entries, .. } if entries.len() == 1
    )));
}

#[tokio::test(start_paused = true)]
async fn slow_store_times_out_as_transport_failure() {
    let env = SimEnv::with_seed(7);
    let server = SimServer::new();
    let link = RoomLink::create("https://veil.example", &env);
    let channel = ChannelId::Room(link.room_id());
    seed_room(&server, &env, &link, &["eventually"]).await;
    server.set_channel_latency(channel, Duration::from_secs(30)).await;
    let mut handle = spawn(&server, &env, 1);

    handle.commands.send(SyncCommand::Open(Channel::room(&link))).await.unwrap();
    next_update(&mut handle).await;

    let SyncUpdate::TransportFailure { channel: failed, error } = next_update(&mut handle).await
    else {
        panic!("expected TransportFailure");
    };
    assert_eq!(failed, channel);
    assert_eq!(error, TransportError::Timeout { after: SyncConfig::default().request_timeout });

    server.set_channel_latency(channel, Duration::ZERO).await;
    let updates = drain(&mut handle, Duration::from_secs(15)).await;

    assert!(updates.iter().all(|update| !matches!(update, SyncUpdate::Fatal { .. })));
    assert!(updates.iter().any(|update| matches!(
        update,
        SyncUpdate::Timeline { entries, .. } if entries.len() == 1
    )));
}

#[tokio::test(start_paused = true)]
async fn missing_peer_key_stops_polling() {
    let env = SimEnv::with_seed(5);
    let server = SimServer::new();
    let link = RoomLink::create("https://veil.example", &env);
    let channel = ChannelId::Conversation(77);
    let envelope = encrypt("unreadable", link.key().key(), &mut env.rng()).unwrap();
    server.inject(channel, 2, envelope).await;
    let mut handle = spawn(&server, &env, 1);

    handle.commands.send(SyncCommand::Open(Channel::conversation(77, 2))).await.unwrap();
    next_update(&mut handle).await;

    let SyncUpdate::Fatal { error, .. } = next_update(&mut handle).await else {
        panic!("expected Fatal");
    };
    assert_eq!(error, SessionError::PeerKeyMissing { user_id: 2 });

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(server.list_calls(channel).await, 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_commands_stops_loop() {
    let env = SimEnv::with_seed(6);
    let server = SimServer::new();
    let SyncHandle { commands, mut updates, .. } = spawn(&server, &env, 1);

    drop(commands);

    assert!(updates.recv().await.is_none());
}
