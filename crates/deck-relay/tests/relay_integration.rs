//! Integration tests for the WebSocket listener and session lifecycle.
//!
//! # Purpose
//!
//! These tests run the real accept loop against a real client socket, the
//! same way a plugin front-end uses it.  They verify:
//!
//! - The authentication gate: a wrong or missing key is refused during the
//!   upgrade handshake, before any session exists.
//! - The happy path: an authenticated connection produces a session, the
//!   bootstrap frames fire `init` exactly once, and frames sent through the
//!   relay arrive on the client socket verbatim.
//! - The cardinality policy over the wire: a second connection is closed by
//!   the relay while the first keeps working.
//! - Close semantics: a client disconnect fires `close` and discards the
//!   session's derived state.
//!
//! Each test binds port `0` and serves on the resulting listener, so tests
//! run in parallel without port collisions.

use std::net::SocketAddr;
use std::sync::{atomic::AtomicBool, Arc};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use deck_relay::infrastructure::serve;
use deck_relay::{Relay, RelayConfig, SessionPolicy};

const KEY: &str = "integration-secret";

/// Binds an ephemeral port and serves a fresh relay on it.
async fn start_relay(policy: SessionPolicy) -> (Arc<Relay>, SocketAddr, Arc<AtomicBool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let relay = Arc::new(Relay::new(RelayConfig {
        bind_addr: addr,
        key: KEY.to_string(),
        policy,
    }));

    let running = Arc::new(AtomicBool::new(true));
    tokio::spawn(serve(listener, Arc::clone(&relay), Arc::clone(&running)));

    (relay, addr, running)
}

fn ws_url(addr: SocketAddr, key: &str) -> String {
    format!("ws://{addr}/?key={key}")
}

/// Registers a listener that forwards each `event` payload into a channel the
/// test can await on with a timeout.
fn subscribe(relay: &Relay, event: &str) -> mpsc::UnboundedReceiver<Value> {
    let (tx, rx) = mpsc::unbounded_channel();
    relay.on(event, move |payload| {
        let _ = tx.send(payload.clone());
    });
    rx
}

async fn recv_event(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

// ── Authentication gate ───────────────────────────────────────────────────────

/// A wrong key must be refused during the handshake: the client sees a failed
/// upgrade and the relay never creates a session or fires an event.
#[tokio::test]
async fn test_wrong_key_is_refused_before_any_session_exists() {
    let (relay, addr, _running) = start_relay(SessionPolicy::RefuseExtra).await;
    let mut opens = subscribe(&relay, "open");

    let result = connect_async(ws_url(addr, "wrong-key")).await;

    assert!(result.is_err(), "handshake must fail with a bad key");
    assert_eq!(relay.session_count(), 0);
    assert!(opens.try_recv().is_err(), "no open event may fire");
}

#[tokio::test]
async fn test_missing_key_is_refused() {
    let (relay, addr, _running) = start_relay(SessionPolicy::RefuseExtra).await;

    let result = connect_async(format!("ws://{addr}/")).await;

    assert!(result.is_err());
    assert_eq!(relay.session_count(), 0);
}

// ── Session lifecycle ─────────────────────────────────────────────────────────

/// A correct key completes the handshake, the relay admits a session, and the
/// `open` event fires.
#[tokio::test]
async fn test_correct_key_establishes_session_and_fires_open() {
    let (relay, addr, _running) = start_relay(SessionPolicy::RefuseExtra).await;
    let mut opens = subscribe(&relay, "open");

    let (_client, _response) = connect_async(ws_url(addr, KEY)).await.expect("connect");

    recv_event(&mut opens).await;
    assert_eq!(relay.session_count(), 1);
}

/// The two bootstrap frames sent over the wire produce exactly one `init`
/// event and populate the plugin identifier and the button cache.
#[tokio::test]
async fn test_bootstrap_frames_over_the_wire_fire_init_once() {
    let (relay, addr, _running) = start_relay(SessionPolicy::RefuseExtra).await;
    let mut opens = subscribe(&relay, "open");
    let mut inits = subscribe(&relay, "init");

    let (mut client, _) = connect_async(ws_url(addr, KEY)).await.expect("connect");
    recv_event(&mut opens).await;

    client
        .send(WsMessage::Text(
            r#"{ "type": "init", "data": { "pluginUUID": "wire-plugin" } }"#.to_string(),
        ))
        .await
        .expect("send init");
    client
        .send(WsMessage::Text(
            r#"{
                "type": "buttonLocationsUpdated",
                "data": { "buttonLocations": { "D1": { "0": { "0": null } } } }
            }"#
            .to_string(),
        ))
        .await
        .expect("send locations");

    recv_event(&mut inits).await;
    assert!(inits.try_recv().is_err(), "init must fire exactly once");
    assert_eq!(relay.plugin_uuid(None).as_deref(), Some("wire-plugin"));
    assert_eq!(relay.button_locations(None).slot_count(), 1);
}

/// A device event relayed from the wire reaches listeners under its own name
/// and under `message`, carrying the embedded payload.
#[tokio::test]
async fn test_raw_device_event_reaches_listeners() {
    let (relay, addr, _running) = start_relay(SessionPolicy::RefuseExtra).await;
    let mut opens = subscribe(&relay, "open");
    let mut key_downs = subscribe(&relay, "keyDown");
    let mut messages = subscribe(&relay, "message");

    let (mut client, _) = connect_async(ws_url(addr, KEY)).await.expect("connect");
    recv_event(&mut opens).await;

    client
        .send(WsMessage::Text(
            r#"{ "type": "rawSD", "data": { "event": "keyDown", "context": "ctx-9" } }"#
                .to_string(),
        ))
        .await
        .expect("send rawSD");

    let named = recv_event(&mut key_downs).await;
    let catch_all = recv_event(&mut messages).await;
    assert_eq!(named["context"], "ctx-9");
    assert_eq!(named, catch_all);
}

/// A frame sent through the relay arrives on the client socket as one text
/// frame with the exact serialized payload.
#[tokio::test]
async fn test_send_reaches_the_client_socket() {
    let (relay, addr, _running) = start_relay(SessionPolicy::RefuseExtra).await;
    let mut opens = subscribe(&relay, "open");

    let (mut client, _) = connect_async(ws_url(addr, KEY)).await.expect("connect");
    recv_event(&mut opens).await;

    let payload = json!({ "context": "ctx-1", "event": "setTitle", "payload": { "title": "Hi" } });
    assert!(relay.send(None, &payload));

    let frame = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream ended")
        .expect("ws error");
    match frame {
        WsMessage::Text(text) => {
            assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), payload);
        }
        other => panic!("expected a text frame, got {other:?}"),
    }
}

// ── Cardinality policy over the wire ──────────────────────────────────────────

/// Under `RefuseExtra`, a second connection completes the handshake (the key
/// was valid) but is closed by the relay immediately; the first session keeps
/// working.
#[tokio::test]
async fn test_second_connection_is_turned_away_under_refuse_extra() {
    let (relay, addr, _running) = start_relay(SessionPolicy::RefuseExtra).await;
    let mut opens = subscribe(&relay, "open");

    let (mut first, _) = connect_async(ws_url(addr, KEY)).await.expect("first connect");
    recv_event(&mut opens).await;

    let (mut second, _) = connect_async(ws_url(addr, KEY)).await.expect("second connect");

    // The relay closes the second socket without admitting it.
    let outcome = timeout(Duration::from_secs(2), second.next())
        .await
        .expect("timed out waiting for refusal");
    match outcome {
        Some(Ok(WsMessage::Close(_))) | None => {}
        other => panic!("expected the second connection to be closed, got {other:?}"),
    }
    assert_eq!(relay.session_count(), 1);
    assert!(opens.try_recv().is_err(), "no second open event may fire");

    // The surviving session still relays frames.
    assert!(relay.send(None, &json!({ "event": "ping" })));
    let frame = timeout(Duration::from_secs(2), first.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("ws error");
    assert!(matches!(frame, WsMessage::Text(_)));
}

/// Under `Unbounded`, both connections get their own session.
#[tokio::test]
async fn test_unbounded_admits_a_second_connection() {
    let (relay, addr, _running) = start_relay(SessionPolicy::Unbounded).await;
    let mut opens = subscribe(&relay, "open");

    let (_first, _) = connect_async(ws_url(addr, KEY)).await.expect("first connect");
    let (_second, _) = connect_async(ws_url(addr, KEY)).await.expect("second connect");

    recv_event(&mut opens).await;
    recv_event(&mut opens).await;
    assert_eq!(relay.session_count(), 2);
}

// ── Close semantics ───────────────────────────────────────────────────────────

/// A client disconnect fires `close` and discards the session's derived
/// state; afterwards a send attempt reports failure.
#[tokio::test]
async fn test_client_close_tears_the_session_down() {
    let (relay, addr, _running) = start_relay(SessionPolicy::RefuseExtra).await;
    let mut opens = subscribe(&relay, "open");
    let mut closes = subscribe(&relay, "close");

    let (mut client, _) = connect_async(ws_url(addr, KEY)).await.expect("connect");
    recv_event(&mut opens).await;
    client
        .send(WsMessage::Text(
            r#"{
                "type": "buttonLocationsUpdated",
                "data": { "buttonLocations": { "D1": { "0": { "0": null } } } }
            }"#
            .to_string(),
        ))
        .await
        .expect("send locations");

    client.close(None).await.expect("close");

    let close_payload = recv_event(&mut closes).await;
    assert!(close_payload["code"].is_number());
    assert_eq!(relay.session_count(), 0);
    assert!(relay.button_locations(None).is_empty());
    assert!(!relay.send(None, &json!({ "event": "ping" })));
}
