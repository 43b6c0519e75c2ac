//! Application layer: the relay state machine.
//!
//! [`relay::Relay`] owns the session registry, applies classified frame
//! effects (cache replacement, init tracking), and exposes the send path and
//! query surface.  [`events::EventBus`] is the re-broadcast layer local
//! listeners subscribe to.
//!
//! Nothing here opens a socket; infrastructure feeds frames in and consumes
//! admission decisions.

pub mod events;
pub mod relay;

pub use events::EventBus;
pub use relay::{Rejected, Relay};
