//! deck-relay library crate.
//!
//! This crate is the controller-side endpoint of the device-host socket: it
//! accepts WebSocket connections from the thin plugin script running inside
//! the vendor control-panel runtime, authenticates them against a shared key,
//! derives a button-location cache from the frames it sees, and re-broadcasts
//! protocol events to local listeners.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Device-host plugin (JSON over WebSocket)
//!         ↕
//! [deck-relay]
//!   ├── domain/           RelayConfig, SessionPolicy, per-session state
//!   ├── application/      Session registry, classifier effects, event bus,
//!   │                     outbound sender (the Relay type)
//!   └── infrastructure/
//!         └── ws_server/  Accept loop, key check, per-session tasks
//!         ↕
//! Controller application (library consumer: `Relay::on(..)`, `Relay::send(..)`)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no transport dependencies (types and policy only).
//! - `application` depends on `domain` and `deck-relay-core` only; it never
//!   touches sockets, so every session/classifier rule is testable without a
//!   network.
//! - `infrastructure` depends on all other layers plus `tokio` and
//!   `tungstenite`.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::relay::{Rejected, Relay};
pub use domain::config::{RelayConfig, SessionPolicy};
pub use domain::session::SessionId;
