mod support;

use dogfight_server::domain::PeerId;
use dogfight_server::interface_adapters::protocol::Packet;
use dogfight_server::interface_adapters::wire;
use futures_util::StreamExt;
use glam::Vec2;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect() -> WsStream {
    let url = support::ensure_server();
    let (ws, _) = connect_async(url).await.expect("ws connect");
    ws
}

/// Read frames until the predicate extracts a value or the deadline passes.
async fn wait_for<T>(ws: &mut WsStream, mut pick: impl FnMut(&Packet) -> Option<T>) -> T {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            let msg = ws.next().await.expect("socket open").expect("frame");
            if let Message::Binary(bytes) = msg {
                if let Ok(packet) = wire::decode(&bytes) {
                    if let Some(value) = pick(&packet) {
                        return value;
                    }
                }
            }
        }
    })
    .await
    .expect("expected packet before deadline")
}

fn identity(packet: &Packet) -> Option<(PeerId, u64, Vec2)> {
    match packet {
        Packet::Identity { peer, plane, pos } => Some((*peer, *plane, *pos)),
        _ => None,
    }
}

#[tokio::test]
async fn two_peers_get_unique_ids_and_safe_spawns() {
    let mut a = connect().await;
    let (peer_a, plane_a, pos_a) = wait_for(&mut a, identity).await;

    let mut b = connect().await;
    let (peer_b, plane_b, pos_b) = wait_for(&mut b, identity).await;

    assert_ne!(peer_a, peer_b);
    assert_ne!(plane_a, plane_b);
    // Spawn positions honor the configured minimum distance from live
    // planes; quantization error is far below the bound.
    let min_dist = 600.0;
    assert!(
        pos_a.distance(pos_b) >= min_dist - 1.0,
        "spawns {pos_a:?} and {pos_b:?} too close"
    );
}

#[tokio::test]
async fn world_updates_flow_after_join() {
    let mut ws = connect().await;
    let (_, plane, spawn_pos) = wait_for(&mut ws, identity).await;

    // The server starts streaming position updates for our plane.
    let pos = wait_for(&mut ws, |packet| match packet {
        Packet::PositionUpdate { id, pos, .. } if *id == plane => Some(*pos),
        _ => None,
    })
    .await;

    // Stationary plane with zero throttle: position matches the spawn within
    // wire quantization.
    assert!(pos.distance(spawn_pos) < 1.0);
}

#[tokio::test]
async fn status_updates_carry_full_health_on_join() {
    let mut ws = connect().await;
    let (_, plane, _) = wait_for(&mut ws, identity).await;

    let (hp, alive) = wait_for(&mut ws, |packet| match packet {
        Packet::StatusUpdate { id, hp, alive } if *id == plane => Some((*hp, *alive)),
        _ => None,
    })
    .await;
    assert_eq!(hp, 100);
    assert!(alive);
}
