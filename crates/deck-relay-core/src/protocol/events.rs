//! Names of the events the relay emits to local listeners.
//!
//! Two vocabularies meet here:
//!
//! - **Lifecycle events** the relay itself raises (`open`, `init`, `error`,
//!   `close`, `message`).
//! - **Device-host events** embedded in `rawSD` frames and re-emitted under
//!   their own names.  The wire vocabulary is open-ended — any embedded event
//!   name is forwarded verbatim without a code change — so these constants
//!   exist only so listeners can register without typo risk.

// ── Lifecycle events ──────────────────────────────────────────────────────────

/// A session was admitted.
pub const OPEN: &str = "open";
/// A session has received both bootstrap facts (plugin identity and button
/// layout) and is ready for use.  Fires at most once per session.
pub const INIT: &str = "init";
/// A malformed frame or transport error was observed on a session.
pub const ERROR: &str = "error";
/// A session ended; the payload carries the close code and optional reason.
pub const CLOSE: &str = "close";
/// Generic catch-all raised alongside every re-emitted device-host event.
pub const MESSAGE: &str = "message";

// ── Device-host events ────────────────────────────────────────────────────────

pub const KEY_DOWN: &str = "keyDown";
pub const KEY_UP: &str = "keyUp";
pub const WILL_APPEAR: &str = "willAppear";
pub const WILL_DISAPPEAR: &str = "willDisappear";
pub const TITLE_PARAMETERS_DID_CHANGE: &str = "titleParametersDidChange";
pub const DEVICE_DID_CONNECT: &str = "deviceDidConnect";
pub const DEVICE_DID_DISCONNECT: &str = "deviceDidDisconnect";
pub const APPLICATION_DID_LAUNCH: &str = "applicationDidLaunch";
pub const APPLICATION_DID_TERMINATE: &str = "applicationDidTerminate";
pub const SYSTEM_DID_WAKE_UP: &str = "systemDidWakeUp";
pub const PROPERTY_INSPECTOR_DID_APPEAR: &str = "propertyInspectorDidAppear";
pub const PROPERTY_INSPECTOR_DID_DISAPPEAR: &str = "propertyInspectorDidDisappear";
pub const SEND_TO_PLUGIN: &str = "sendToPlugin";
pub const DID_RECEIVE_SETTINGS: &str = "didReceiveSettings";
pub const DID_RECEIVE_GLOBAL_SETTINGS: &str = "didReceiveGlobalSettings";

/// The documented device-host event names, for docs and tests.  Forwarding is
/// not limited to this list.
pub const DEVICE_HOST_EVENTS: [&str; 15] = [
    KEY_DOWN,
    KEY_UP,
    WILL_APPEAR,
    WILL_DISAPPEAR,
    TITLE_PARAMETERS_DID_CHANGE,
    DEVICE_DID_CONNECT,
    DEVICE_DID_DISCONNECT,
    APPLICATION_DID_LAUNCH,
    APPLICATION_DID_TERMINATE,
    SYSTEM_DID_WAKE_UP,
    PROPERTY_INSPECTOR_DID_APPEAR,
    PROPERTY_INSPECTOR_DID_DISAPPEAR,
    SEND_TO_PLUGIN,
    DID_RECEIVE_SETTINGS,
    DID_RECEIVE_GLOBAL_SETTINGS,
];

// ── Tests ─────────────────────────────────────────────────────────────────────
