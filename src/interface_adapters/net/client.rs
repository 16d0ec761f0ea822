// Client host: connects to a server, runs the shared poll shape (drain
// outgoing, service the socket for a bounded timeout, dispatch events, pace),
// and smooths remote entities through per-entity interpolation buffers.

use crate::domain::{EntityId, InterpBuffer};
use crate::interface_adapters::protocol::Packet;
use crate::interface_adapters::wire;
use futures_util::{SinkExt, StreamExt};
use glam::Vec2;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Bound on a single socket service call.
const SERVICE_TIMEOUT: Duration = Duration::from_millis(50);

/// Inbound silence past this threshold is a peer timeout.
const INBOUND_TIMEOUT: Duration = Duration::from_secs(5);

/// Inbound connection events dispatched to the embedding game code.
pub trait ClientHandler: Send {
    fn on_connect(&mut self) {}
    fn on_disconnect(&mut self) {}
    fn on_timeout(&mut self) {}
    fn on_packet(&mut self, packet: Packet);
}

/// Connect and run the poll loop until the outbound queue closes or the
/// connection drops. Sync pings are echoed internally; everything else goes
/// to the handler.
pub async fn run_client(
    url: &str,
    mut outbound_rx: mpsc::Receiver<Packet>,
    handler: &mut dyn ClientHandler,
) {
    let (ws, _) = match connect_async(url).await {
        Ok(ok) => ok,
        Err(e) => {
            warn!(url, error = %e, "connect failed");
            handler.on_disconnect();
            return;
        }
    };
    info!(url, "connected");
    handler.on_connect();

    let (mut sink, mut stream) = ws.split();
    let mut last_inbound = Instant::now();
    // High-resolution wait capping the polling rate.
    let mut pacer = tokio::time::interval(Duration::from_millis(2));
    pacer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    'poll: loop {
        // Drain the outgoing queue.
        loop {
            match outbound_rx.try_recv() {
                Ok(packet) => {
                    let bytes = wire::encode(&packet);
                    if sink.send(Message::Binary(bytes.into())).await.is_err() {
                        handler.on_disconnect();
                        break 'poll;
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    let _ = sink.send(Message::Close(None)).await;
                    handler.on_disconnect();
                    break 'poll;
                }
            }
        }

        // Service the transport for a bounded timeout.
        match tokio::time::timeout(SERVICE_TIMEOUT, stream.next()).await {
            Ok(Some(Ok(Message::Binary(bytes)))) => {
                last_inbound = Instant::now();
                match wire::decode(&bytes) {
                    // Echo handshake pings straight back; the server halves
                    // the round trip into our lag estimate.
                    Ok(ping @ Packet::Sync { .. }) => {
                        let bytes = wire::encode(&ping);
                        if sink.send(Message::Binary(bytes.into())).await.is_err() {
                            handler.on_disconnect();
                            break 'poll;
                        }
                        handler.on_packet(ping);
                    }
                    Ok(packet) => handler.on_packet(packet),
                    Err(e) => {
                        // Treated as loss; interpolation rides it out.
                        debug!(error = %e, "undecodable packet dropped");
                    }
                }
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                handler.on_disconnect();
                break;
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                debug!(error = %e, "socket error");
                handler.on_disconnect();
                break;
            }
            Err(_) => {
                // Service window elapsed without traffic.
                if last_inbound.elapsed() > INBOUND_TIMEOUT {
                    warn!("server went silent");
                    handler.on_timeout();
                    break;
                }
            }
        }

        pacer.tick().await;
    }
}

/// Client-side view of remote entities: every position update feeds a
/// per-entity interpolation buffer, and rendering reads the delayed smoothed
/// pose instead of raw packets.
#[derive(Debug)]
pub struct ClientWorld {
    buffers: HashMap<EntityId, InterpBuffer>,
    tick_ms: f64,
    started: Instant,
}

impl ClientWorld {
    pub fn new(tick_ms: f64) -> Self {
        Self {
            buffers: HashMap::new(),
            tick_ms,
            started: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    pub fn apply(&mut self, packet: &Packet) {
        let now_ms = self.now_ms();
        self.apply_at(packet, now_ms);
    }

    /// Test hook taking an explicit receipt time.
    pub fn apply_at(&mut self, packet: &Packet, now_ms: f64) {
        match packet {
            Packet::PositionUpdate {
                id,
                pos,
                rot_deg,
                t_ms,
                ..
            } => {
                let buffer = self
                    .buffers
                    .entry(*id)
                    .or_insert_with(|| InterpBuffer::new(self.tick_ms));
                buffer.enqueue(*pos, rot_deg.to_radians(), *t_ms, now_ms);
            }
            Packet::Expire { id } => {
                self.buffers.remove(id);
            }
            _ => {}
        }
    }

    /// Smoothed pose for rendering, `None` once the entity is gone.
    pub fn pose(&mut self, id: EntityId, now_ms: f64) -> Option<(Vec2, f32)> {
        self.buffers.get_mut(&id).map(|b| b.interpolate(now_ms))
    }

    pub fn tracked(&self) -> usize {
        self.buffers.len()
    }
}
