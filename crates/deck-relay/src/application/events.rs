//! The listener registry events are re-broadcast through.
//!
//! Event identity is a plain string, because the device-host vocabulary is
//! open-ended: a `rawSD` frame embedding an event name this code has never
//! seen must still reach listeners registered under that name.  The
//! *classifier* works on a closed tagged enum; only this re-broadcast layer
//! is stringly keyed, and on purpose.
//!
//! Emission is synchronous: every registered listener runs before `emit`
//! returns, on the emitting task.  Listeners are cloned out of the registry
//! lock before being invoked, so a listener may itself register listeners or
//! call back into the relay (e.g. `send`) without deadlocking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// A listener bound to one event name.
type NamedListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// A listener receiving every event plus its name.
type CatchAllListener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// String-keyed dispatch table for local event delivery.
#[derive(Default)]
pub struct EventBus {
    named: Mutex<HashMap<String, Vec<NamedListener>>>,
    catch_all: Mutex<Vec<CatchAllListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for events emitted under `event`.  Registering
    /// the same closure twice means it runs twice.
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.named
            .lock()
            .expect("event registry poisoned")
            .entry(event.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Registers a listener for every event, regardless of name.
    pub fn on_any<F>(&self, listener: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.catch_all
            .lock()
            .expect("event registry poisoned")
            .push(Arc::new(listener));
    }

    /// Delivers `payload` to every listener registered under `event`, then to
    /// every catch-all listener.  Emitting a name nobody listens to is a
    /// no-op, not an error.
    pub fn emit(&self, event: &str, payload: &Value) {
        let named: Vec<NamedListener> = {
            let registry = self.named.lock().expect("event registry poisoned");
            registry.get(event).cloned().unwrap_or_default()
        };
        for listener in named {
            listener(payload);
        }

        let catch_all: Vec<CatchAllListener> = {
            self.catch_all
                .lock()
                .expect("event registry poisoned")
                .clone()
        };
        for listener in catch_all {
            listener(event, payload);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let named = self.named.lock().expect("event registry poisoned");
        f.debug_struct("EventBus")
            .field("named_events", &named.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
