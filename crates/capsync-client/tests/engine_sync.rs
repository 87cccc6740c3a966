//! Two engines synchronizing through a real relay on loopback.

use std::time::Duration;

use capsync_client::config::Config;
use capsync_client::engine::{Engine, EngineEvent, LinkStatus};
use capsync_client::link;
use capsync_client::ClientStatus;
use capsync_relay::{RelayConfig, RelayServer};
use capsync_types::{AssetIndex, AssetState, BoardSide, CapperSlot, RoleName, SenderId};
use tokio::sync::{mpsc, watch};

async fn spawn_relay() -> String {
    let config = RelayConfig {
        bind: "127.0.0.1".to_string(),
        port: 0,
        ..RelayConfig::default()
    };
    let server = RelayServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    format!("ws://{addr}")
}

/// Build an engine wired to the relay and run it in a task.
async fn spawn_engine(url: &str) -> (SenderId, mpsc::Sender<EngineEvent>, watch::Receiver<ClientStatus>) {
    let config = Config {
        relay: capsync_client::config::RelayClientConfig {
            url: Some(url.to_string()),
            password: None,
            connect_timeout_secs: 5,
        },
        lan: capsync_client::config::LanConfig { enabled: false, port: 0 },
        ..Config::default()
    };

    let mut engine = Engine::new(SenderId::new(), vec![35.0, 25.0, 20.0]);
    let id = engine.local_id();
    let events = engine.event_sender();
    let status = engine.status_receiver();

    let attached = link::establish(&mut engine, &config).await.unwrap();
    assert_eq!(attached, LinkStatus::Relay);

    tokio::spawn(async move { engine.run().await });
    (id, events, status)
}

/// Wait until a published status snapshot satisfies `pred`.
async fn wait_for<F>(status: &mut watch::Receiver<ClientStatus>, mut pred: F) -> ClientStatus
where
    F: FnMut(&ClientStatus) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&status.borrow()) {
                return status.borrow().clone();
            }
            status.changed().await.unwrap();
        }
    })
    .await
    .expect("status condition not reached in time")
}

#[tokio::test]
async fn role_claims_arbitrate_across_engines() {
    let url = spawn_relay().await;
    let (id1, events1, mut status1) = spawn_engine(&url).await;
    let (_id2, events2, mut status2) = spawn_engine(&url).await;

    let capper1 = RoleName::capper(CapperSlot::One);
    let capper2 = RoleName::capper(CapperSlot::Two);

    // First engine claims capper1 and gets it.
    events1.send(EngineEvent::ClaimRole(capper1.clone())).await.unwrap();
    wait_for(&mut status1, |s| s.local_roles.contains(&capper1)).await;

    // The ownership snapshot reaches the second engine.
    let snapshot = wait_for(&mut status2, |s| {
        s.role_owners.get(&capper1) == Some(&Some(id1))
    })
    .await;
    assert_eq!(snapshot.role_owners.get(&capper2), Some(&None));

    // Second engine's claim for the same slot is rejected.
    events2.send(EngineEvent::ClaimRole(capper1.clone())).await.unwrap();
    let snapshot = wait_for(&mut status2, |s| s.last_denied.is_some()).await;
    assert_eq!(snapshot.last_denied, Some(capper1.clone()));
    assert!(!snapshot.local_roles.contains(&capper1));

    // The other slot is free and the grant clears the denial.
    events2.send(EngineEvent::ClaimRole(capper2.clone())).await.unwrap();
    let snapshot = wait_for(&mut status2, |s| s.local_roles.contains(&capper2)).await;
    assert_eq!(snapshot.last_denied, None);
}

#[tokio::test]
async fn board_edits_propagate_and_derive() {
    let url = spawn_relay().await;
    let (_id1, events1, _status1) = spawn_engine(&url).await;
    let (_id2, _events2, mut status2) = spawn_engine(&url).await;

    // Engine 1 marks the defense generator destroyed.
    events1
        .send(EngineEvent::LocalBoardSet {
            side: BoardSide::Defense,
            index: AssetIndex::GENERATOR,
            state: AssetState::Destroyed,
        })
        .await
        .unwrap();

    // Engine 2 sees the raw write and the derived degradation.
    let snapshot = wait_for(&mut status2, |s| {
        s.effective_defense[0] == AssetState::Destroyed
    })
    .await;
    assert_eq!(
        snapshot.effective_defense,
        [
            AssetState::Destroyed,
            AssetState::Contested,
            AssetState::Contested,
            AssetState::Contested
        ]
    );
    assert_eq!(snapshot.effective_offense, [AssetState::Normal; 4]);
}

#[tokio::test]
async fn countdown_starts_reach_peers_not_self_twice() {
    let url = spawn_relay().await;
    let (_id1, events1, mut status1) = spawn_engine(&url).await;
    let (_id2, _events2, mut status2) = spawn_engine(&url).await;

    events1.send(EngineEvent::LocalStart { slot: CapperSlot::One }).await.unwrap();

    let snapshot = wait_for(&mut status2, |s| s.countdowns[0].is_some()).await;
    assert_eq!(snapshot.countdowns[0].unwrap().seconds, 35.0);

    // The origin applied it exactly once, from the local mutator; the
    // hotkey cycle has not advanced past the first duration.
    let snapshot = wait_for(&mut status1, |s| s.countdowns[0].is_some()).await;
    assert_eq!(snapshot.countdowns[0].unwrap().seconds, 35.0);
}
