//! Inbound frame classification.
//!
//! A raw text frame is decoded once, then dispatched on its `"type"` field.
//! Unknown types are a *normal* outcome ([`InboundFrame::Unknown`]) — the
//! device-host plugin may be newer than this relay — while an undecodable
//! frame or a known type with malformed `data` is a [`ProtocolError`] the
//! caller must surface rather than swallow.
//!
//! # Why not `#[serde(tag = "type")]` on one enum?
//!
//! A tagged enum rejects unknown tags at decode time, which would turn
//! "future frame type we ignore" into a hard error.  Splitting the decode
//! into envelope-then-data keeps the two failure classes apart: bad JSON is
//! fatal for the frame, an unrecognised discriminator is not.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::buttons::ButtonLocations;

// ── Errors ────────────────────────────────────────────────────────────────────

/// A frame that could not be classified.
///
/// Per-frame, not per-session: the session's cache is untouched and later
/// frames are processed normally.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON or lacked the `"type"` envelope.
    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// A recognised frame type carried data that does not match its schema.
    #[error("malformed `{frame_type}` data: {reason}")]
    BadData {
        frame_type: &'static str,
        reason: String,
    },

    /// A `rawSD` frame whose data has no string `event` field to re-emit.
    #[error("rawSD frame has no string `event` field")]
    MissingEventName,
}

// ── Classification ────────────────────────────────────────────────────────────

/// One classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// `init`: the plugin announces its identifier.
    Init { plugin_uuid: String },

    /// `buttonLocationsUpdated`: a complete replacement cache.
    ButtonLocationsUpdated { button_locations: ButtonLocations },

    /// `rawSD`: an embedded device-host event to re-emit verbatim.  `payload`
    /// is the whole `data` object, `event` its extracted name.
    RawEvent { event: String, payload: Value },

    /// Any other discriminator: accepted and ignored.
    Unknown { frame_type: String },
}

/// The outer envelope shared by every frame.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct InitData {
    #[serde(rename = "pluginUUID")]
    plugin_uuid: String,
}

#[derive(Debug, Deserialize)]
struct LocationsData {
    #[serde(rename = "buttonLocations")]
    button_locations: ButtonLocations,
}

impl InboundFrame {
    /// Classifies one raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the frame is not a JSON object with a
    /// string `type`, or when a recognised type carries malformed data.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        match envelope.frame_type.as_str() {
            "init" => {
                let data: InitData =
                    serde_json::from_value(envelope.data).map_err(|e| ProtocolError::BadData {
                        frame_type: "init",
                        reason: e.to_string(),
                    })?;
                Ok(Self::Init {
                    plugin_uuid: data.plugin_uuid,
                })
            }
            "buttonLocationsUpdated" => {
                let data: LocationsData =
                    serde_json::from_value(envelope.data).map_err(|e| ProtocolError::BadData {
                        frame_type: "buttonLocationsUpdated",
                        reason: e.to_string(),
                    })?;
                Ok(Self::ButtonLocationsUpdated {
                    button_locations: data.button_locations,
                })
            }
            "rawSD" => {
                let event = envelope
                    .data
                    .get("event")
                    .and_then(Value::as_str)
                    .ok_or(ProtocolError::MissingEventName)?
                    .to_string();
                Ok(Self::RawEvent {
                    event,
                    payload: envelope.data,
                })
            }
            other => Ok(Self::Unknown {
                frame_type: other.to_string(),
            }),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_init_frame() {
        // Arrange: the bootstrap frame sent once per connection.
        let json = r#"{ "type": "init", "data": { "pluginUUID": "plugin-123" } }"#;

        // Act
        let frame = InboundFrame::parse(json).unwrap();

        // Assert
        assert_eq!(
            frame,
            InboundFrame::Init {
                plugin_uuid: "plugin-123".to_string()
            }
        );
    }

    #[test]
    fn test_parse_button_locations_frame() {
        let json = r#"{
            "type": "buttonLocationsUpdated",
            "data": { "buttonLocations": { "D1": { "0": { "0": null } } } }
        }"#;

        let frame = InboundFrame::parse(json).unwrap();

        match frame {
            InboundFrame::ButtonLocationsUpdated { button_locations } => {
                assert_eq!(button_locations.slot_count(), 1);
            }
            other => panic!("expected ButtonLocationsUpdated, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_raw_event_extracts_name_and_keeps_payload() {
        let json = r#"{
            "type": "rawSD",
            "data": { "event": "keyDown", "context": "ctx-1", "payload": { "state": 0 } }
        }"#;

        let frame = InboundFrame::parse(json).unwrap();

        match frame {
            InboundFrame::RawEvent { event, payload } => {
                assert_eq!(event, "keyDown");
                // The payload is the whole `data` object, `event` included.
                assert_eq!(payload["event"], "keyDown");
                assert_eq!(payload["context"], "ctx-1");
            }
            other => panic!("expected RawEvent, got {other:?}"),
        }
    }

    #[test]
    fn test_future_event_names_pass_through() {
        // The vocabulary is open-ended: names this crate has never heard of
        // must classify cleanly.
        let json = r#"{ "type": "rawSD", "data": { "event": "dialRotate" } }"#;
        let frame = InboundFrame::parse(json).unwrap();
        match frame {
            InboundFrame::RawEvent { event, .. } => assert_eq!(event, "dialRotate"),
            other => panic!("expected RawEvent, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_classified_not_rejected() {
        let json = r#"{ "type": "somethingElse", "data": { "x": 1 } }"#;
        let frame = InboundFrame::parse(json).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Unknown {
                frame_type: "somethingElse".to_string()
            }
        );
    }

    #[test]
    fn test_missing_data_on_unknown_type_is_fine() {
        let json = r#"{ "type": "ping" }"#;
        let frame = InboundFrame::parse(json).unwrap();
        assert!(matches!(frame, InboundFrame::Unknown { .. }));
    }

    #[test]
    fn test_invalid_json_is_a_decode_error() {
        let result = InboundFrame::parse("{ not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_missing_type_field_is_a_decode_error() {
        let result = InboundFrame::parse(r#"{ "data": {} }"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_init_without_plugin_uuid_is_bad_data() {
        let result = InboundFrame::parse(r#"{ "type": "init", "data": {} }"#);
        assert!(matches!(
            result,
            Err(ProtocolError::BadData {
                frame_type: "init",
                ..
            })
        ));
    }

    #[test]
    fn test_locations_with_non_numeric_row_is_bad_data() {
        let json = r#"{
            "type": "buttonLocationsUpdated",
            "data": { "buttonLocations": { "D1": { "top": {} } } }
        }"#;
        let result = InboundFrame::parse(json);
        assert!(matches!(
            result,
            Err(ProtocolError::BadData {
                frame_type: "buttonLocationsUpdated",
                ..
            })
        ));
    }

    #[test]
    fn test_raw_event_without_event_name_is_rejected() {
        let json = r#"{ "type": "rawSD", "data": { "context": "ctx-1" } }"#;
        let result = InboundFrame::parse(json);
        assert!(matches!(result, Err(ProtocolError::MissingEventName)));
    }

    #[test]
    fn test_raw_event_with_non_string_event_is_rejected() {
        let json = r#"{ "type": "rawSD", "data": { "event": 7 } }"#;
        let result = InboundFrame::parse(json);
        assert!(matches!(result, Err(ProtocolError::MissingEventName)));
    }
}
