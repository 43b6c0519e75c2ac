//! # deck-relay-core
//!
//! Shared library for Deck-Relay containing the plugin-facing wire protocol
//! and the button-location domain model.
//!
//! This crate is used by the relay service and by library consumers that want
//! to parse or construct wire frames directly.  It has zero dependencies on
//! async runtimes, sockets, or UI frameworks.
//!
//! # What is Deck-Relay?
//!
//! A hardware control panel (a grid of programmable buttons) is driven by a
//! vendor plugin runtime.  A thin plugin script inside that runtime forwards
//! everything it sees over a local WebSocket to an external controller
//! application, and accepts frames to write back to the device host.  This
//! workspace is the controller-side endpoint of that socket.
//!
//! This crate (`deck-relay-core`) is the pure foundation.  It defines:
//!
//! - **`protocol`** – The JSON frames that travel over the socket.  Each frame
//!   carries a `"type"` discriminator; [`protocol::frame::InboundFrame`]
//!   classifies a raw text frame into a typed effect.
//!
//! - **`domain`** – The button-location cache: a mapping from
//!   (device, row, column) slots to button descriptors, replaced wholesale
//!   whenever the plugin reports a layout change.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `deck_relay_core::ButtonLocations` instead of the full module path.
pub use domain::buttons::{ButtonDescriptor, ButtonLocations, SlotAddress, TitleParameters};
pub use protocol::frame::{InboundFrame, ProtocolError};
