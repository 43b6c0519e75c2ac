//! Per-session state.
//!
//! Everything the relay derives from one plugin connection lives here, owned
//! by the session and discarded with it at teardown.  The historical pattern
//! of free-standing module-level mutables (`buttonLocations`, `pluginUUID`)
//! becomes fields with explicit construction and teardown, never shared
//! process-wide.

use deck_relay_core::ButtonLocations;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque identifier for one admitted connection, assigned by the transport
/// layer at admission.
pub type SessionId = Uuid;

/// The init counter saturates here: plugin identity plus button layout.
const INIT_READY: u8 = 2;

/// State derived from one admitted plugin connection.
///
/// Constructed empty at admission; mutated only by that session's own frame
/// handling; dropped whole at teardown.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,

    /// Plugin identifier learned from the first `init` frame, if any.
    pub plugin_uuid: Option<String>,

    /// Counts distinct bootstrap facts received (0–2).  Plugin identity and
    /// button layout arrive as independent, order-unspecified frames;
    /// consumers must not assume readiness until both have been seen once.
    init_progress: u8,

    /// Current button-location cache, wholesale-replaced on update.
    pub locations: ButtonLocations,

    /// Serialized outbound frames travel through this channel to the socket
    /// writer task.  A closed channel means the transport is gone.
    pub outbound: mpsc::UnboundedSender<String>,
}

impl Session {
    pub fn new(id: SessionId, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            plugin_uuid: None,
            init_progress: 0,
            locations: ButtonLocations::new(),
            outbound,
        }
    }

    /// Advances the init counter by one bootstrap fact.
    ///
    /// Returns `true` exactly when the counter *first* reaches saturation —
    /// the one moment the `init` event should fire.  Further calls saturate
    /// silently.
    pub fn advance_init(&mut self) -> bool {
        if self.init_progress >= INIT_READY {
            return false;
        }
        self.init_progress += 1;
        self.init_progress == INIT_READY
    }

    /// True once both bootstrap facts have arrived.
    pub fn is_ready(&self) -> bool {
        self.init_progress >= INIT_READY
    }

    /// True while the outbound transport can still accept writes.
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
