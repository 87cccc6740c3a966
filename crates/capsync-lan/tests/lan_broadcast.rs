//! LAN fallback tests on loopback.

use std::time::Duration;

use capsync_lan::LanLink;
use capsync_types::{CapperSlot, Envelope, RoleName, SenderId};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

async fn feeder(port: u16) -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.connect(("127.0.0.1", port)).await.unwrap();
    socket
}

#[tokio::test]
async fn listener_receives_start_event() {
    let link = LanLink::bind(0).unwrap();
    let port = link.local_port().unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let _listener = link.spawn_listener(tx);

    let sender = SenderId::new();
    let event = Envelope::Start { seconds: 35.0, sender, capper: CapperSlot::One };
    let feeder = feeder(port).await;
    feeder.send(serde_json::to_vec(&event).unwrap().as_slice()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("listener should deliver the event")
        .unwrap();
    assert_eq!(received, event);
}

#[tokio::test]
async fn malformed_datagrams_do_not_kill_the_loop() {
    let link = LanLink::bind(0).unwrap();
    let port = link.local_port().unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let _listener = link.spawn_listener(tx);

    let feeder = feeder(port).await;
    feeder.send(b"definitely not json").await.unwrap();
    feeder.send(br#"{"cmd":"no_such_cmd"}"#).await.unwrap();
    feeder.send(br#"{"unrelated":"datagram"}"#).await.unwrap();

    // The loop must survive and still deliver a valid event.
    let event = Envelope::Start {
        seconds: 20.0,
        sender: SenderId::new(),
        capper: CapperSlot::Two,
    };
    feeder.send(serde_json::to_vec(&event).unwrap().as_slice()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("listener should still be alive")
        .unwrap();
    assert_eq!(received, event);
}

#[tokio::test]
async fn role_frames_are_not_carried_on_lan() {
    let link = LanLink::bind(0).unwrap();
    let port = link.local_port().unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let _listener = link.spawn_listener(tx);

    let feeder = feeder(port).await;
    let claim = Envelope::RoleClaim {
        role: RoleName::from("capper1"),
        sender: SenderId::new(),
    };
    feeder.send(serde_json::to_vec(&claim).unwrap().as_slice()).await.unwrap();

    // Followed by a board update, which must be the first thing out.
    let update: Envelope = serde_json::from_str(&format!(
        r#"{{"cmd":"board_update","board":"defense","index":1,"state":2,"sender":"{}"}}"#,
        SenderId::new()
    ))
    .unwrap();
    feeder.send(serde_json::to_vec(&update).unwrap().as_slice()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("board update should arrive")
        .unwrap();
    assert_eq!(received, update);
}

#[tokio::test]
async fn two_links_can_share_one_port() {
    // Address reuse lets several clients on one machine bind the same
    // fallback port.
    let first = LanLink::bind(0).unwrap();
    let port = first.local_port().unwrap();
    let second = LanLink::bind(port).unwrap();
    assert_eq!(second.local_port().unwrap(), port);
}

#[tokio::test]
async fn send_is_best_effort() {
    let link = LanLink::bind(0).unwrap();
    let event = Envelope::Start {
        seconds: 25.0,
        sender: SenderId::new(),
        capper: CapperSlot::One,
    };
    // Even if the subnet broadcast goes nowhere, send never errors.
    link.send(&event).await.unwrap();
}
