//! Domain layer for deck-relay: configuration and per-session state.
//!
//! Nothing in this module performs I/O.  The session type holds an outbound
//! channel handle so the application layer can write without knowing the
//! transport, but opening and closing that transport is infrastructure's job.

pub mod config;
pub mod session;

pub use config::{RelayConfig, SessionPolicy};
pub use session::{Session, SessionId};
