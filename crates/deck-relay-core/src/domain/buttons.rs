//! The button-location cache and button descriptor types.
//!
//! # Wire shape vs. internal shape
//!
//! On the wire the cache is a three-level JSON object:
//!
//! ```json
//! {
//!   "<deviceId>": {
//!     "0": { "0": { ...button... }, "1": null },
//!     "1": { "0": null }
//!   }
//! }
//! ```
//!
//! Row and column keys are decimal strings (JavaScript object keys), and an
//! unoccupied slot is an explicit `null`.
//!
//! Internally the nesting is flattened into a single ordered map keyed by a
//! composite [`SlotAddress`] (device, row, column).  Deep dictionary-of-
//! dictionary mutation is where sub-tree replacement bugs live; with one flat
//! map, "replace the whole cache" is a single assignment and iteration order
//! (device, then row, then column) falls out of the `Ord` impl for free.
//! The nested view exists only at the serde boundary.

use std::collections::BTreeMap;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Descriptor types ──────────────────────────────────────────────────────────

/// Title-rendering parameters for one button, as reported by the device host.
///
/// All fields are opaque to the relay; they are cached and handed back to
/// queries verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleParameters {
    pub font_family: String,
    pub font_size: i64,
    pub font_style: String,
    pub font_underline: bool,
    pub show_title: bool,
    pub title_alignment: String,
    pub title_color: String,
}

/// Metadata for one occupied button slot.
///
/// `context` is the opaque identifier the device host expects back when the
/// controller addresses this button (e.g. in a `setTitle` frame).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonDescriptor {
    pub context: String,
    pub action: String,
    pub title: String,
    pub is_in_multi_action: bool,
    pub state: i64,
    pub title_parameters: TitleParameters,
}

// ── Slot addressing ───────────────────────────────────────────────────────────

/// Composite key for one slot in the cache: device, then row, then column.
///
/// The derived `Ord` sorts by field order, which is exactly the
/// device-then-row-then-column scan order queries advertise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotAddress {
    pub device: String,
    pub row: u8,
    pub column: u8,
}

impl SlotAddress {
    pub fn new(device: impl Into<String>, row: u8, column: u8) -> Self {
        Self {
            device: device.into(),
            row,
            column,
        }
    }
}

// ── The cache ─────────────────────────────────────────────────────────────────

/// The per-session button-location cache.
///
/// Replaced wholesale on every `buttonLocationsUpdated` frame; never patched
/// incrementally.  An entry of `None` is a known-empty slot (the wire `null`),
/// distinct from a slot that was never reported at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ButtonLocations {
    slots: BTreeMap<SlotAddress, Option<ButtonDescriptor>>,
}

impl ButtonLocations {
    /// Creates an empty cache (the state of every fresh session).
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no slots have been reported.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of reported slots, occupied or not.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Records one slot.  Mostly useful for building fixtures; production
    /// caches arrive fully formed via deserialization.
    pub fn insert(&mut self, address: SlotAddress, button: Option<ButtonDescriptor>) {
        self.slots.insert(address, button);
    }

    /// Returns the descriptor at a slot, or `None` for empty and unreported
    /// slots alike.
    pub fn button_at(&self, device: &str, row: u8, column: u8) -> Option<&ButtonDescriptor> {
        let key = SlotAddress::new(device, row, column);
        self.slots.get(&key).and_then(|slot| slot.as_ref())
    }

    /// Iterates every reported slot in device-then-row-then-column order.
    pub fn iter(&self) -> impl Iterator<Item = (&SlotAddress, Option<&ButtonDescriptor>)> {
        self.slots.iter().map(|(addr, slot)| (addr, slot.as_ref()))
    }

    /// Returns every occupied slot whose action identifier equals `action`,
    /// in scan order.  Empty slots are skipped without error; each match
    /// appears exactly once.
    pub fn find_by_action<'a>(&'a self, action: &str) -> Vec<&'a ButtonDescriptor> {
        self.slots
            .values()
            .filter_map(|slot| slot.as_ref())
            .filter(|button| button.action == action)
            .collect()
    }
}

// Serde goes through the nested wire shape.  `BTreeMap` on the outside keeps
// the serialized device/row/column ordering stable.
type NestedView = BTreeMap<String, BTreeMap<String, BTreeMap<String, Option<ButtonDescriptor>>>>;

impl Serialize for ButtonLocations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut nested = NestedView::new();
        for (addr, slot) in &self.slots {
            nested
                .entry(addr.device.clone())
                .or_default()
                .entry(addr.row.to_string())
                .or_default()
                .insert(addr.column.to_string(), slot.clone());
        }
        nested.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ButtonLocations {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let nested = NestedView::deserialize(deserializer)?;
        let mut slots = BTreeMap::new();
        for (device, rows) in nested {
            for (row_key, columns) in rows {
                let row: u8 = row_key
                    .parse()
                    .map_err(|_| DeError::custom(format!("non-numeric row index `{row_key}`")))?;
                for (column_key, slot) in columns {
                    let column: u8 = column_key.parse().map_err(|_| {
                        DeError::custom(format!("non-numeric column index `{column_key}`"))
                    })?;
                    slots.insert(SlotAddress::new(device.clone(), row, column), slot);
                }
            }
        }
        Ok(Self { slots })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
