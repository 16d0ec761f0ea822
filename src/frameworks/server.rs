// Server bootstrap: channel wiring, background tasks, WebSocket router.

use crate::frameworks::config;
use crate::interface_adapters::net::server::{AppState, PeerTable, timeout_sweep, ws_handler};
use crate::interface_adapters::net::discovery::{ServerPresence, announce_loop};
use crate::use_cases::{GameEvent, ServerState, WorldUpdate, world_task};
use axum::{Router, routing::get};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Notify, RwLock, broadcast, mpsc, watch};
use tracing::info;

/// Wire everything up and serve until the listener dies.
pub async fn run(listener: TcpListener) -> std::io::Result<()> {
    run_with(listener, config::DEFAULT_START_DELAY, config::DEFAULT_MATCH_TIME_LIMIT).await
}

/// Bootstrap with explicit pacing, used by integration tests to skip the
/// match-start countdown.
pub async fn run_with(
    listener: TcpListener,
    start_delay: Duration,
    match_time_limit: Duration,
) -> std::io::Result<()> {
    // input_tx/rx: all client traffic funnels into the single world task.
    let (input_tx, input_rx) = mpsc::channel::<GameEvent>(config::INPUT_CHANNEL_CAPACITY);

    // world_tx: per-tick snapshots broadcast to every connection task.
    let (world_tx, _world_rx) = broadcast::channel::<WorldUpdate>(config::WORLD_BROADCAST_CAPACITY);

    // server_state_tx: high-level match lifecycle changes.
    let (server_state_tx, _server_state_rx) = watch::channel::<ServerState>(ServerState::Lobby);

    let shutdown = Arc::new(Notify::new());
    let peers = Arc::new(RwLock::new(PeerTable::default()));

    tokio::spawn(world_task(
        input_rx,
        world_tx.clone(),
        server_state_tx,
        config::TICK_INTERVAL,
        shutdown.clone(),
        start_delay,
        match_time_limit,
    ));

    tokio::spawn(timeout_sweep(
        peers.clone(),
        input_tx.clone(),
        config::PEER_TIMEOUT,
    ));

    let game_port = listener.local_addr().map(|a| a.port()).unwrap_or_default();
    tokio::spawn(announce_loop(
        ServerPresence {
            name: config::server_name(),
            port: game_port,
            players: 0,
        },
        config::discovery_port(),
    ));

    let state = Arc::new(AppState {
        input_tx,
        world_tx,
        peers,
    });

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state);

    info!(port = game_port, "listening");
    let result = axum::serve(listener, app).await;
    shutdown.notify_waiters();
    result
}
