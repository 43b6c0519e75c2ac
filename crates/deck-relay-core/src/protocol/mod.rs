//! Wire protocol: frame classification and the emitted-event vocabulary.
//!
//! The device-host plugin speaks JSON text frames over a local WebSocket.
//! Every inbound frame is an object with a `"type"` discriminator and a
//! `"data"` payload:
//!
//! ```json
//! { "type": "init", "data": { "pluginUUID": "..." } }
//! { "type": "buttonLocationsUpdated", "data": { "buttonLocations": { ... } } }
//! { "type": "rawSD", "data": { "event": "keyDown", ... } }
//! ```
//!
//! Outbound frames are arbitrary caller-supplied JSON written verbatim;
//! there is no outbound frame type to define here.

pub mod events;
pub mod frame;

pub use frame::{InboundFrame, ProtocolError};
