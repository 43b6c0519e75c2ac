//! Domain layer: pure button-location types with no I/O dependencies.
//!
//! The only entity here is the button-location cache and its constituent
//! descriptor types.  The cache is *derived* state: the device-host plugin
//! computes the authoritative layout and ships it over the wire as one
//! complete structure, so this layer never merges partial updates.

pub mod buttons;

pub use buttons::{ButtonDescriptor, ButtonLocations, SlotAddress, TitleParameters};
