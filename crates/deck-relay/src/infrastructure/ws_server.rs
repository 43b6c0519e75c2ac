//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from plugin front-ends.
//! 3. Checking the shared-secret `key` query parameter **during** the upgrade
//!    handshake, so an unauthenticated peer is refused with `401` before any
//!    session exists.
//! 4. Asking the relay to admit the authenticated connection under the
//!    configured cardinality policy.
//! 5. Running two tasks per admitted session:
//!    - **Writer**: drains the session's outbound channel into the socket.
//!    - **Reader**: feeds incoming text frames to [`Relay::handle_frame`] and
//!      tracks the close code for teardown.
//! 6. Gracefully shutting down when the `running` flag is cleared.
//!
//! Each session runs in its own Tokio task; the accept loop never blocks on a
//! session.  Shutdown is a shared `AtomicBool` set by the Ctrl+C handler in
//! `main.rs`, checked between short accept timeouts.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use percent_encoding::percent_decode_str;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
        protocol::{frame::coding::CloseCode, CloseFrame},
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};

use crate::application::Relay;

/// Close code sent to a connection the cardinality policy turned away.
const REFUSED_CLOSE_CODE: u16 = 4002;

/// Close code recorded when the transport failed without a Close frame.
const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Close code recorded when the peer vanished without sending any status.
const NO_STATUS_CLOSE_CODE: u16 = 1005;

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the configured listen address and runs the accept loop until
/// `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(relay: Arc<Relay>, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let bind_addr = relay.config().bind_addr;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {bind_addr}"))?;

    info!("relay listening on {bind_addr}");
    serve(listener, relay, running).await
}

/// Runs the accept loop on an already-bound listener.
///
/// Split out from [`run_server`] so callers (and tests) can bind port `0` and
/// learn the real address from the listener before serving.  Each accepted
/// connection is handed to a dedicated Tokio task so one slow plugin never
/// delays another.
pub async fn serve(
    listener: TcpListener,
    relay: Arc<Relay>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short timeout on accept() so the loop keeps checking the running
        // flag even when no plugin is connecting.
        let accept_result = timeout(Duration::from_millis(200), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, peer_addr))) => {
                debug!("incoming connection from {peer_addr}");
                let relay = Arc::clone(&relay);
                tokio::spawn(async move {
                    handle_plugin_connection(stream, peer_addr, relay).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., out of file descriptors).
                // Log and keep serving rather than taking the relay down.
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timeout; loop back to check the running flag.
            }
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Top-level handler for one plugin connection: wraps [`run_session`] and
/// logs the outcome.  The outer/inner pair keeps `?` propagation clean inside
/// while errors still get logged exactly once out here.
async fn handle_plugin_connection(raw_stream: TcpStream, peer_addr: SocketAddr, relay: Arc<Relay>) {
    match run_session(raw_stream, peer_addr, relay).await {
        Ok(()) => debug!("connection from {peer_addr} finished"),
        Err(e) => warn!("connection from {peer_addr} failed: {e:#}"),
    }
}

/// Runs the complete lifecycle of one plugin connection: handshake with key
/// check, admission, the reader loop, and teardown.
///
/// A refused handshake or a policy rejection is a *normal* outcome here (the
/// peer was turned away by design), so both return `Ok(())`.
///
/// # Errors
///
/// Returns an error only for genuine transport failures during the upgrade
/// handshake.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    relay: Arc<Relay>,
) -> anyhow::Result<()> {
    // ── Handshake with authentication gate ─────────────────────────────────
    //
    // The key check runs inside the upgrade callback: a bad or missing key
    // answers the HTTP upgrade request with 401 and the socket never becomes
    // a WebSocket, let alone a session.  No relay state is touched and no
    // event fires for a refused peer.
    let expected_key = relay.config().key.as_str();
    let handshake = accept_hdr_async(raw_stream, |request: &Request, response: Response| {
        if key_matches(request.uri().query(), expected_key) {
            Ok(response)
        } else {
            warn!("connection from {peer_addr} refused: invalid or missing key");
            let mut refusal = ErrorResponse::new(Some("invalid or missing key".to_string()));
            *refusal.status_mut() = StatusCode::UNAUTHORIZED;
            Err(refusal)
        }
    })
    .await;

    let ws_stream = match handshake {
        Ok(ws) => ws,
        // The 401 path: the refusal response was already written.
        Err(WsError::Http(_)) => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("WebSocket handshake failed with {peer_addr}"))
        }
    };

    // ── Admission ──────────────────────────────────────────────────────────
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let session_id = match relay.admit(out_tx) {
        Ok(id) => id,
        Err(rejected) => {
            info!("connection from {peer_addr} turned away: {rejected}");
            let mut ws_stream = ws_stream;
            let _ = ws_stream
                .close(Some(CloseFrame {
                    code: CloseCode::from(REFUSED_CLOSE_CODE),
                    reason: "an active session already exists".into(),
                }))
                .await;
            return Ok(());
        }
    };
    info!("session {session_id} established with {peer_addr}");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // ── Writer task ────────────────────────────────────────────────────────
    //
    // Drains the session's outbound channel into the socket.  When the
    // channel closes (session torn down) or a write fails (peer gone), the
    // task ends and the channel reports closed, which is exactly what
    // `Session::is_open` observes.
    let writer_task = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_tx.send(WsMessage::Text(text)).await.is_err() {
                debug!("outbound write failed; peer disconnected");
                break;
            }
        }
    });

    // ── Reader loop ────────────────────────────────────────────────────────
    let mut close_code = NO_STATUS_CLOSE_CODE;
    let mut close_reason: Option<String> = None;

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                // A malformed frame is already surfaced on the relay's error
                // channel; the session itself carries on.
                let _ = relay.handle_frame(session_id, &text);
            }
            Ok(WsMessage::Binary(_)) => {
                warn!("session {session_id}: unexpected binary frame (ignored)");
            }
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_)) => {
                // Protocol-level keepalive; tungstenite answers pings itself.
            }
            Ok(WsMessage::Close(frame)) => {
                if let Some(frame) = frame {
                    close_code = u16::from(frame.code);
                    if !frame.reason.is_empty() {
                        close_reason = Some(frame.reason.into_owned());
                    }
                }
                break;
            }
            Ok(WsMessage::Frame(_)) => {
                debug!("session {session_id}: raw frame (ignored)");
            }
            Err(WsError::ConnectionClosed | WsError::Protocol(_)) => {
                break;
            }
            Err(e) => {
                relay.report_error(session_id, &e.to_string());
                close_code = ABNORMAL_CLOSE_CODE;
                break;
            }
        }
    }

    // ── Teardown ───────────────────────────────────────────────────────────
    writer_task.abort();
    relay.teardown(session_id, close_code, close_reason);
    Ok(())
}

// ── Key check ─────────────────────────────────────────────────────────────────

/// True when the request's query string carries a `key` parameter equal to
/// `expected` after URL decoding.  An absent or empty presented key never
/// matches, regardless of what was configured.
///
/// Decoding follows query-string conventions: `%XX` escapes plus `+` for
/// space, so a secret containing reserved characters still authenticates
/// when the plugin builds its URL with a standard query encoder.
fn key_matches(query: Option<&str>, expected: &str) -> bool {
    let Some(raw) = query_param(query.unwrap_or(""), "key") else {
        return false;
    };
    let raw = raw.replace('+', " ");
    let Ok(presented) = percent_decode_str(&raw).decode_utf8() else {
        // A presented key that is not valid UTF-8 cannot equal any
        // configured secret.
        return false;
    };
    !presented.is_empty() && presented == expected
}

/// Extracts one raw (still-encoded) parameter value from a query string.
fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == name).then_some(v)
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
