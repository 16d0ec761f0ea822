// Server-presence discovery over a well-known UDP port, independent of the
// game channel. Presence datagrams are plain JSON; anything that fails to
// parse is dropped as loss.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerPresence {
    pub name: String,
    pub port: u16,
    pub players: u32,
}

/// Broadcast this server's presence until the socket or process dies.
pub async fn announce_loop(presence: ServerPresence, discovery_port: u16) {
    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "discovery announce socket unavailable");
            return;
        }
    };
    if let Err(e) = socket.set_broadcast(true) {
        warn!(error = %e, "discovery broadcast flag rejected");
        return;
    }
    let target = format!("255.255.255.255:{discovery_port}");
    let payload = match serde_json::to_vec(&presence) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "presence serialization failed");
            return;
        }
    };

    let mut interval = tokio::time::interval(ANNOUNCE_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = socket.send_to(&payload, &target).await {
            debug!(error = %e, "presence broadcast failed");
        }
    }
}

/// Bind the well-known discovery port for listening.
pub async fn bind_listener(discovery_port: u16) -> std::io::Result<UdpSocket> {
    UdpSocket::bind(("0.0.0.0", discovery_port)).await
}

/// Receive the next valid presence datagram; malformed ones are skipped.
pub async fn recv_presence(socket: &UdpSocket) -> std::io::Result<(SocketAddr, ServerPresence)> {
    let mut buf = [0u8; 512];
    loop {
        let (len, addr) = socket.recv_from(&mut buf).await?;
        match serde_json::from_slice::<ServerPresence>(&buf[..len]) {
            Ok(presence) => return Ok((addr, presence)),
            Err(e) => {
                debug!(%addr, error = %e, "malformed presence dropped");
            }
        }
    }
}
