// Server host: WebSocket peer lifecycle over the external ordered transport,
// per-peer outbound queues with delivery-mode semantics, send targeting, and
// the timeout sweep.

use crate::domain::PeerId;
use crate::interface_adapters::protocol::{Delivery, Packet};
use crate::interface_adapters::wire;
use crate::use_cases::{GameEvent, ProjectileClass, WorldUpdate};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, info, warn};

/// Per-peer outbound queue depth. Reliable sends apply backpressure against
/// it; instant sends drop instead.
const PEER_QUEUE_CAPACITY: usize = 256;

#[derive(Debug)]
struct PeerHandle {
    tx: mpsc::Sender<Vec<u8>>,
    last_seen: Instant,
}

/// Connected peers and the id allocator.
#[derive(Debug, Default)]
pub struct PeerTable {
    next_id: PeerId,
    peers: HashMap<PeerId, PeerHandle>,
}

impl PeerTable {
    fn register(&mut self, tx: mpsc::Sender<Vec<u8>>) -> PeerId {
        self.next_id += 1;
        let peer = self.next_id;
        self.peers.insert(
            peer,
            PeerHandle {
                tx,
                last_seen: Instant::now(),
            },
        );
        peer
    }

    fn remove(&mut self, peer: PeerId) {
        self.peers.remove(&peer);
    }

    fn touch(&mut self, peer: PeerId) {
        if let Some(handle) = self.peers.get_mut(&peer) {
            handle.last_seen = Instant::now();
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Who a packet goes to.
#[derive(Debug, Clone, Copy)]
pub enum SendTarget {
    All,
    AllExcept(PeerId),
    One(PeerId),
}

/// Shared state handed to every connection handler.
pub struct AppState {
    pub input_tx: mpsc::Sender<GameEvent>,
    pub world_tx: broadcast::Sender<WorldUpdate>,
    pub peers: Arc<RwLock<PeerTable>>,
}

/// Encode once, fan out per target. Reliable packets await queue space;
/// instant packets are dropped when a peer's queue is full.
pub async fn send_packet(peers: &RwLock<PeerTable>, target: SendTarget, packet: &Packet) {
    let bytes = wire::encode(packet);
    let delivery = packet.delivery();

    let txs: Vec<(PeerId, mpsc::Sender<Vec<u8>>)> = {
        let table = peers.read().await;
        table
            .peers
            .iter()
            .filter(|(id, _)| match target {
                SendTarget::All => true,
                SendTarget::AllExcept(skip) => **id != skip,
                SendTarget::One(only) => **id == only,
            })
            .map(|(id, handle)| (*id, handle.tx.clone()))
            .collect()
    };

    for (peer, tx) in txs {
        match delivery {
            Delivery::ReliableOrdered => {
                if tx.send(bytes.clone()).await.is_err() {
                    debug!(peer, "dropping send to closing peer");
                }
            }
            Delivery::Instant => {
                let _ = tx.try_send(bytes.clone());
            }
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (tx, rx) = mpsc::channel::<Vec<u8>>(PEER_QUEUE_CAPACITY);
    let peer = state.peers.write().await.register(tx);
    info!(peer, "peer connected");

    // Subscribe before Join so the spawn announcement cannot slip past.
    let world_rx = state.world_tx.subscribe();
    if state.input_tx.send(GameEvent::Join { peer }).await.is_err() {
        warn!(peer, "world task gone; refusing connection");
        state.peers.write().await.remove(peer);
        return;
    }

    connection_loop(socket, peer, rx, world_rx, &state).await;

    // Socket closed, errored, or timed out: drop the peer everywhere.
    state.peers.write().await.remove(peer);
    let _ = state.input_tx.send(GameEvent::Leave { peer }).await;
    info!(peer, "peer disconnected");
}

async fn connection_loop(
    socket: WebSocket,
    peer: PeerId,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
    mut world_rx: broadcast::Receiver<WorldUpdate>,
    state: &Arc<AppState>,
) {
    let (mut sink, mut stream) = socket.split();
    // Entities this connection has been told about, with the last status
    // sent for each; first sight emits the spawn packet, status re-sends
    // only on change.
    let mut known: HashMap<u64, (i32, bool)> = HashMap::new();
    let mut sync_interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            out = outbound_rx.recv() => {
                let Some(bytes) = out else { break };
                if sink.send(Message::Binary(bytes.into())).await.is_err() {
                    break;
                }
            }
            update = world_rx.recv() => {
                match update {
                    Ok(update) => {
                        if forward_world_update(&mut sink, peer, &update, &mut known)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(peer, missed = n, "slow consumer; skipping to latest update");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Binary(bytes))) => {
                        state.peers.write().await.touch(peer);
                        handle_inbound(peer, &bytes, state).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(peer, error = %e, "socket error");
                        break;
                    }
                }
            }
            _ = sync_interval.tick() => {
                // Clock handshake ping; the echo measures this peer's RTT.
                let ping = Packet::Sync { peer, t_ms: now_ms() };
                let bytes = wire::encode(&ping);
                if sink.send(Message::Binary(bytes.into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Process-relative milliseconds. Ping timestamps must fit the wire's 32-bit
/// quarter-millisecond field, which an epoch-based clock would overflow.
fn now_ms() -> f64 {
    use std::sync::OnceLock;
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs_f64() * 1000.0
}

/// Decode and dispatch one inbound frame. Undecodable input is dropped as
/// loss, never escalated.
async fn handle_inbound(peer: PeerId, bytes: &[u8], state: &Arc<AppState>) {
    let packet = match wire::decode(bytes) {
        Ok(packet) => packet,
        Err(e) => {
            debug!(peer, error = %e, "undecodable packet dropped");
            return;
        }
    };

    match packet {
        Packet::Input {
            thrust,
            turn,
            fire_gun,
            fire_missile,
            drop_decoy,
        } => {
            let input = crate::domain::PlaneInput {
                thrust,
                turn,
                fire_gun,
                fire_missile,
                drop_decoy,
            };
            let _ = state.input_tx.send(GameEvent::Input { peer, input }).await;
        }
        // Echoed handshake ping: half the round trip is this peer's lag.
        Packet::Sync { t_ms, .. } => {
            let rtt = (now_ms() - t_ms).max(0.0);
            let _ = state
                .input_tx
                .send(GameEvent::Lag {
                    peer,
                    lag_ms: rtt / 2.0,
                })
                .await;
        }
        Packet::Chat { text, .. } => {
            let relay = Packet::Chat { peer, text };
            send_packet(&state.peers, SendTarget::AllExcept(peer), &relay).await;
        }
        other => {
            debug!(peer, tag = other.tag(), "unexpected client packet ignored");
        }
    }
}

type WsSink = futures::stream::SplitSink<WebSocket, Message>;

/// Translate one world snapshot into wire packets for this connection.
async fn forward_world_update(
    sink: &mut WsSink,
    peer: PeerId,
    update: &WorldUpdate,
    known: &mut HashMap<u64, (i32, bool)>,
) -> Result<(), axum::Error> {
    let mut packets: Vec<Packet> = Vec::new();

    for &(spawn_peer, plane, pos) in &update.spawned {
        if spawn_peer == peer {
            packets.push(Packet::Identity {
                peer,
                plane,
                pos,
            });
        }
    }

    for plane in &update.planes {
        let status = (plane.hp, plane.alive);
        if known.insert(plane.id, status) != Some(status) {
            packets.push(Packet::StatusUpdate {
                id: plane.id,
                hp: plane.hp,
                alive: plane.alive,
            });
        }
        packets.push(Packet::PositionUpdate {
            id: plane.id,
            pos: plane.pos,
            vel: plane.vel,
            rot_deg: plane.rot.to_degrees().rem_euclid(360.0),
            deflection: 0.0,
            dt_ms: 0.0,
            t_ms: update.now_ms,
        });
    }

    for proj in &update.projectiles {
        if known.insert(proj.id, (0, true)).is_none() {
            let owner = proj.owner.unwrap_or_default();
            packets.push(match proj.class {
                ProjectileClass::Bullet => Packet::SpawnBullet {
                    id: proj.id,
                    owner,
                    pos: proj.pos,
                    vel: proj.vel,
                },
                ProjectileClass::Missile => Packet::SpawnMissile {
                    id: proj.id,
                    owner,
                    pos: proj.pos,
                    vel: proj.vel,
                    rot_deg: proj.rot.to_degrees().rem_euclid(360.0),
                },
                ProjectileClass::Decoy => Packet::SpawnDecoy {
                    id: proj.id,
                    owner,
                    pos: proj.pos,
                    vel: proj.vel,
                },
            });
        } else {
            packets.push(Packet::PositionUpdate {
                id: proj.id,
                pos: proj.pos,
                vel: proj.vel,
                rot_deg: proj.rot.to_degrees().rem_euclid(360.0),
                deflection: 0.0,
                dt_ms: 0.0,
                t_ms: update.now_ms,
            });
        }
    }

    for impact in &update.impacts {
        // Offsets travel target-relative so the local-offset quantizer fits.
        let target_pos = update
            .planes
            .iter()
            .find(|p| p.id == impact.target)
            .map(|p| p.pos)
            .unwrap_or(impact.point);
        packets.push(Packet::Impact {
            target: impact.target,
            kind: impact.kind,
            offset: impact.point - target_pos,
            angle_deg: impact.angle.to_degrees().rem_euclid(360.0),
            damage: impact.damage,
            headshot: impact.headshot,
        });
    }

    for &id in &update.expired {
        known.remove(&id);
        packets.push(Packet::Expire { id });
    }

    for packet in packets {
        sink.send(Message::Binary(wire::encode(&packet).into()))
            .await?;
    }
    Ok(())
}

/// Drop peers that have gone quiet past the timeout threshold.
pub async fn timeout_sweep(
    peers: Arc<RwLock<PeerTable>>,
    input_tx: mpsc::Sender<GameEvent>,
    timeout: Duration,
) {
    let mut interval = tokio::time::interval(timeout / 2);
    loop {
        interval.tick().await;
        let stale: Vec<PeerId> = {
            let table = peers.read().await;
            table
                .peers
                .iter()
                .filter(|(_, h)| h.last_seen.elapsed() > timeout)
                .map(|(id, _)| *id)
                .collect()
        };
        for peer in stale {
            warn!(peer, "peer timed out");
            peers.write().await.remove(peer);
            let _ = input_tx.send(GameEvent::Leave { peer }).await;
        }
    }
}
