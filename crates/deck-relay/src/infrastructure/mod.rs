//! Infrastructure layer: the WebSocket listener.
//!
//! Owns everything transport-shaped — TCP accept loop, the upgrade handshake
//! with its key check, per-session reader/writer tasks — and feeds the
//! application layer nothing but admission requests, text frames, and
//! lifecycle notifications.

pub mod ws_server;

pub use ws_server::{run_server, serve};
