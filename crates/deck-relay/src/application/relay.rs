//! The relay state machine: session registry, frame effects, send path.
//!
//! [`Relay`] is the one object a controller application holds.  The
//! infrastructure layer feeds it admission requests and raw frames; local
//! listeners subscribe through [`Relay::on`] / [`Relay::on_any`]; the
//! controller writes back through [`Relay::send`] and the convenience
//! helpers built on top of it.
//!
//! # Locking discipline
//!
//! All mutable state sits behind one `Mutex<RelayState>`.  Frame handling
//! mutates under the lock, *releases it*, and only then emits events — so a
//! listener that re-enters the relay (for example calling `send` from inside
//! a `message` handler) never deadlocks, and cross-session readers always see
//! a cache either before or after a wholesale replacement, never mid-way.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use deck_relay_core::protocol::events as event_names;
use deck_relay_core::{ButtonDescriptor, ButtonLocations, InboundFrame, ProtocolError};

use crate::application::events::EventBus;
use crate::domain::config::{RelayConfig, SessionPolicy};
use crate::domain::session::{Session, SessionId};

/// Close code reported when `PreemptExisting` replaces a live session.
/// 4000–4999 is the application-reserved WebSocket close-code range.
pub const PREEMPT_CLOSE_CODE: u16 = 4000;

/// Admission was refused by the cardinality policy.  The existing session is
/// untouched; the caller just closes the new transport.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("connection refused: an active session already exists")]
pub struct Rejected;

#[derive(Debug, Default)]
struct RelayState {
    sessions: HashMap<SessionId, Session>,
}

impl RelayState {
    /// The implicit target for calls that name no session: the sole open
    /// session, or the sole session of any kind when exactly one exists.
    fn default_target(&self) -> Option<&Session> {
        let mut open = self.sessions.values().filter(|s| s.is_open());
        match (open.next(), open.next()) {
            (Some(only), None) => Some(only),
            _ if self.sessions.len() == 1 => self.sessions.values().next(),
            _ => None,
        }
    }
}

/// The relay core: session registry, button-location caches, event
/// re-broadcasting, and the outbound send path.
#[derive(Debug)]
pub struct Relay {
    config: RelayConfig,
    state: Mutex<RelayState>,
    events: EventBus,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RelayState::default()),
            events: EventBus::new(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    // ── Listener registration ─────────────────────────────────────────────────

    /// Registers a listener for one event name (`open`, `init`, `close`,
    /// `error`, `message`, or any device-host event name).
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.events.on(event, listener);
    }

    /// Registers a listener for every event, with the event name.
    pub fn on_any<F>(&self, listener: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.events.on_any(listener);
    }

    // ── Session registry ──────────────────────────────────────────────────────

    /// Admits an authenticated connection under the configured cardinality
    /// policy.  `outbound` is the channel the transport's writer task drains.
    ///
    /// On admission the session starts with an empty cache and a zeroed init
    /// counter, and an `open` event fires.
    ///
    /// # Errors
    ///
    /// Returns [`Rejected`] under [`SessionPolicy::RefuseExtra`] when a live
    /// session already exists.  No event fires and the existing session is
    /// not disturbed.
    pub fn admit(&self, outbound: mpsc::UnboundedSender<String>) -> Result<SessionId, Rejected> {
        let id = Uuid::new_v4();

        // The policy check, any preemption, and the insert must share one
        // lock scope: two racing admissions under a single-tenant policy must
        // never both observe "no live session" and both insert.  The events
        // still fire only after the lock is released.
        let preempted: Vec<SessionId> = {
            let mut state = self.state.lock().expect("relay state poisoned");
            let preempted = match self.config.policy {
                SessionPolicy::RefuseExtra => {
                    // A session whose transport already went away does not
                    // block admission; it just has not been reaped yet.
                    if state.sessions.values().any(Session::is_open) {
                        return Err(Rejected);
                    }
                    Vec::new()
                }
                SessionPolicy::PreemptExisting => state.sessions.drain().map(|(id, _)| id).collect(),
                SessionPolicy::Unbounded => Vec::new(),
            };
            state.sessions.insert(id, Session::new(id, outbound));
            preempted
        };

        for old in preempted {
            self.emit_close(
                old,
                PREEMPT_CLOSE_CODE,
                Some("replaced by a newer connection".to_string()),
            );
        }

        info!("session {id} admitted");
        self.events.emit(event_names::OPEN, &self.session_tag(id));
        Ok(id)
    }

    /// Ends a session: discards all of its derived state, then emits `close`.
    ///
    /// State is gone *before* listeners run, so a `send` attempted from
    /// inside a `close` handler already reports failure.  Tearing down an
    /// unknown session is a no-op (the transport task and a preemption can
    /// race here).
    pub fn teardown(&self, id: SessionId, code: u16, reason: Option<String>) {
        let removed = {
            let mut state = self.state.lock().expect("relay state poisoned");
            state.sessions.remove(&id)
        };
        if removed.is_none() {
            return;
        }
        self.emit_close(id, code, reason);
    }

    /// Logs and emits the `close` event for a session whose state is already
    /// gone from the registry.
    fn emit_close(&self, id: SessionId, code: u16, reason: Option<String>) {
        info!(
            "session {id} closed (code {code}{})",
            reason.as_deref().map(|r| format!(", {r}")).unwrap_or_default()
        );
        self.events.emit(
            event_names::CLOSE,
            &json!({ "session": id.to_string(), "code": code, "reason": reason }),
        );
    }

    /// Surfaces a transport-level error on the `error` channel.  The caller
    /// follows up with [`Relay::teardown`]; the two are separate so the
    /// `error` event precedes `close`, matching the wire lifecycle.
    pub fn report_error(&self, id: SessionId, error: &str) {
        warn!("session {id}: transport error: {error}");
        self.events.emit(
            event_names::ERROR,
            &json!({ "session": id.to_string(), "error": error }),
        );
    }

    // ── Frame handling ────────────────────────────────────────────────────────

    /// Classifies one raw text frame from `id`'s transport and applies its
    /// effect.
    ///
    /// # Errors
    ///
    /// Returns the [`ProtocolError`] for an undecodable or malformed frame.
    /// The error is also emitted on the `error` event channel — exactly once
    /// per bad frame — and the session's cache is left untouched.
    pub fn handle_frame(&self, id: SessionId, text: &str) -> Result<(), ProtocolError> {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("session {id}: dropping malformed frame: {e}");
                self.events.emit(
                    event_names::ERROR,
                    &json!({ "session": id.to_string(), "error": e.to_string() }),
                );
                return Err(e);
            }
        };

        match frame {
            InboundFrame::Init { plugin_uuid } => {
                debug!("session {id}: learned plugin identifier {plugin_uuid}");
                let became_ready = {
                    let mut state = self.state.lock().expect("relay state poisoned");
                    let Some(session) = state.sessions.get_mut(&id) else {
                        return Ok(());
                    };
                    session.plugin_uuid = Some(plugin_uuid);
                    session.advance_init()
                };
                if became_ready {
                    self.events.emit(event_names::INIT, &self.session_tag(id));
                }
            }

            InboundFrame::ButtonLocationsUpdated { button_locations } => {
                debug!(
                    "session {id}: replacing button locations ({} slots)",
                    button_locations.slot_count()
                );
                let became_ready = {
                    let mut state = self.state.lock().expect("relay state poisoned");
                    let Some(session) = state.sessions.get_mut(&id) else {
                        return Ok(());
                    };
                    session.locations = button_locations;
                    session.advance_init()
                };
                if became_ready {
                    self.events.emit(event_names::INIT, &self.session_tag(id));
                }
            }

            InboundFrame::RawEvent { event, payload } => {
                debug!("session {id}: re-emitting device-host event `{event}`");
                self.events.emit(&event, &payload);
                self.events.emit(event_names::MESSAGE, &payload);
            }

            InboundFrame::Unknown { frame_type } => {
                debug!("session {id}: ignoring unrecognised frame type `{frame_type}`");
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Snapshot of a session's button-location cache.  With no target, the
    /// implicit sole session is used.  A gone or unknown session yields an
    /// empty structure, not an error.
    pub fn button_locations(&self, target: Option<SessionId>) -> ButtonLocations {
        let state = self.state.lock().expect("relay state poisoned");
        let session = match target {
            Some(id) => state.sessions.get(&id),
            None => state.default_target(),
        };
        session.map(|s| s.locations.clone()).unwrap_or_default()
    }

    /// Snapshot of every session's cache, keyed by session identifier.
    pub fn button_locations_by_session(&self) -> HashMap<SessionId, ButtonLocations> {
        let state = self.state.lock().expect("relay state poisoned");
        state
            .sessions
            .iter()
            .map(|(id, session)| (*id, session.locations.clone()))
            .collect()
    }

    /// The plugin identifier learned from `init`, if the session has seen one.
    pub fn plugin_uuid(&self, target: Option<SessionId>) -> Option<String> {
        let state = self.state.lock().expect("relay state poisoned");
        let session = match target {
            Some(id) => state.sessions.get(&id),
            None => state.default_target(),
        };
        session.and_then(|s| s.plugin_uuid.clone())
    }

    /// Every occupied slot across all sessions whose action identifier equals
    /// `action`; within one session, device-then-row-then-column order.
    pub fn find_buttons_by_action(&self, action: &str) -> Vec<ButtonDescriptor> {
        let state = self.state.lock().expect("relay state poisoned");
        let mut found = Vec::new();
        for session in state.sessions.values() {
            found.extend(session.locations.find_by_action(action).into_iter().cloned());
        }
        found
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().expect("relay state poisoned").sessions.len()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        let state = self.state.lock().expect("relay state poisoned");
        state.sessions.keys().copied().collect()
    }

    // ── Outbound sender ───────────────────────────────────────────────────────

    /// Serializes `payload` and writes it to the target session's transport.
    ///
    /// Returns `true` when at least one write was handed to an open
    /// transport, `false` otherwise.  A closed or missing target is a normal
    /// condition (no controller plugin currently connected), never an error.
    /// With no explicit target, single-tenant policies address the sole
    /// session and `Unbounded` broadcasts to every open session.
    pub fn send(&self, target: Option<SessionId>, payload: &Value) -> bool {
        let text = payload.to_string();
        let state = self.state.lock().expect("relay state poisoned");
        let targets: Vec<&Session> = match target {
            Some(id) => state.sessions.get(&id).into_iter().collect(),
            None => state.sessions.values().collect(),
        };

        let mut delivered = false;
        for session in targets {
            if session.is_open() && session.outbound.send(text.clone()).is_ok() {
                delivered = true;
            } else {
                debug!("session {}: send skipped, transport closed", session.id);
            }
        }
        delivered
    }

    /// Sends a `setTitle` frame for one button context.
    pub fn update_button_text(&self, context: &str, text: &str) -> bool {
        self.send(
            None,
            &json!({
                "context": context,
                "event": "setTitle",
                "payload": { "title": text },
            }),
        )
    }

    /// Retitles every button bound to `action`, one frame per match.  Each
    /// send succeeds or fails independently; the count of successful sends is
    /// returned.
    pub fn set_text_on_all_buttons_with_action(&self, action: &str, text: &str) -> usize {
        // Collect contexts first: `update_button_text` re-enters the state
        // lock, so the query borrow must end before sending.
        let contexts: Vec<String> = self
            .find_buttons_by_action(action)
            .into_iter()
            .map(|button| button.context)
            .collect();
        contexts
            .iter()
            .filter(|context| self.update_button_text(context, text))
            .count()
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Event payload identifying a session: the id under the multi-tenant
    /// policy, nothing under the single-tenant ones (where there is no
    /// ambiguity to resolve).
    fn session_tag(&self, id: SessionId) -> Value {
        match self.config.policy {
            SessionPolicy::Unbounded => json!(id.to_string()),
            _ => Value::Null,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
