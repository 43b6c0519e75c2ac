//! deck-relay — entry point.
//!
//! Bridges a hardware control-panel plugin runtime to a controller
//! application over a local WebSocket.  The plugin front-end connects to this
//! process (presenting a shared key), streams its state (`init`, button
//! layout updates, raw device events), and accepts command frames back (e.g.
//! `setTitle`).
//!
//! # Usage
//!
//! ```text
//! deck-relay [OPTIONS]
//!
//! Options:
//!   --port   <PORT>    WebSocket listener port [default: 9091]
//!   --bind   <ADDR>    Bind address [default: 127.0.0.1]
//!   --key    <KEY>     Shared secret the plugin must present [default: DEFAULT_KEY]
//!   --policy <POLICY>  Connection-cardinality policy [default: refuse-extra]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable            | Default        | Description                     |
//! |---------------------|----------------|---------------------------------|
//! | `DECK_RELAY_PORT`   | `9091`         | WebSocket listener port         |
//! | `DECK_RELAY_BIND`   | `127.0.0.1`    | Bind address                    |
//! | `DECK_RELAY_KEY`    | `DEFAULT_KEY`  | Shared connection secret        |
//! | `DECK_RELAY_POLICY` | `refuse-extra` | `refuse-extra`, `preempt-existing`, or `unbounded` |
//!
//! # Architecture overview
//!
//! ```text
//! plugin front-end  (JSON over WebSocket, ws://host:9091/?key=...)
//!       ↕
//! deck-relay  ← this process
//!   domain/          RelayConfig, SessionPolicy, per-session state
//!   application/     Relay state machine, event re-broadcasting
//!   infrastructure/  WebSocket listener, key gate, session tasks
//!       ↕
//! controller application  (embeds `Relay` through the library crate)
//! ```

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use deck_relay::domain::config::{RelayConfig, SessionPolicy, DEFAULT_KEY, DEFAULT_PORT};
use deck_relay::infrastructure::run_server;
use deck_relay::Relay;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Relay between a control-panel plugin runtime and a controller application.
#[derive(Debug, Parser)]
#[command(
    name = "deck-relay",
    about = "WebSocket relay for hardware control-panel plugin front-ends",
    version
)]
struct Cli {
    /// TCP port for the WebSocket listener.
    ///
    /// The plugin front-end connects to ws://host:PORT/?key=KEY.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "DECK_RELAY_PORT")]
    port: u16,

    /// IP address to bind the listener to.
    ///
    /// The plugin runtime runs on the same machine, so the default accepts
    /// loopback connections only.  Use `0.0.0.0` to accept from the LAN.
    #[arg(long, default_value = "127.0.0.1", env = "DECK_RELAY_BIND")]
    bind: String,

    /// Shared secret the plugin must present as the `key` query parameter.
    #[arg(long, default_value = DEFAULT_KEY, env = "DECK_RELAY_KEY")]
    key: String,

    /// What happens when a connection arrives while a session already exists:
    /// `refuse-extra` turns the newcomer away, `preempt-existing` replaces
    /// the old session, `unbounded` admits everyone.
    #[arg(long, default_value = "refuse-extra", env = "DECK_RELAY_POLICY")]
    policy: SessionPolicy,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not a valid IP address.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address: '{}:{}'", self.bind, self.port))?;

        Ok(RelayConfig {
            bind_addr,
            key: self.key,
            policy: self.policy,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Initialises `tracing_subscriber`; log level comes from `RUST_LOG`
///    (falling back to `info`).
/// 2. Parses CLI arguments into a [`RelayConfig`].
/// 3. Registers a catch-all listener that logs every relayed event, so the
///    standalone binary shows the plugin's traffic.
/// 4. Spawns a Ctrl+C handler that clears the shared running flag.
/// 5. Runs the accept loop until the flag clears.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.into_relay_config()?;

    info!(
        "deck-relay starting — listening on {}, policy {:?}",
        config.bind_addr, config.policy
    );

    let relay = Arc::new(Relay::new(config));

    // The standalone binary has no embedding application, so its only local
    // consumer is this log line per relayed event.
    relay.on_any(|event, payload| {
        debug!("event `{event}`: {payload}");
    });

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(relay, running).await?;

    info!("deck-relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
