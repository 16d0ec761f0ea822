// Network adapter modules: server host, client host and UDP discovery.

pub mod client;
pub mod discovery;
pub mod server;

pub use client::{ClientHandler, ClientWorld, run_client};
pub use discovery::{ServerPresence, announce_loop};
pub use server::{AppState, PeerTable, SendTarget, send_packet, timeout_sweep, ws_handler};
