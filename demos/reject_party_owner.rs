//! # Reject Party Owner
//!
//! Runs the plugin against a local League client:
//!
//! 1. Read connection details from the client's lockfile
//! 2. Connect the REST client and the websocket event feed
//! 3. Resolve who you are and who leads the party
//! 4. Hand leadership back whenever you receive it
//! 5. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # With the League client running:
//! cargo run --example reject_party_owner
//!
//! # Point at a different install or region:
//! LCU_LOCKFILE="D:/Games/League of Legends/lockfile" \
//! LCU_CHAT_DOMAIN=sec.euw1.pvp.net \
//!     cargo run --example reject_party_owner
//! ```
//!
//! In party chat, `enable party leader` keeps leadership, `disable party
//! leader` starts handing it away again.

use reject_party_owner::{
    ConnectionConfig, HttpLcuClient, LcuWebSocket, PartyOwnerClient, PluginConfig, PluginEvent,
};

/// Lockfile location when `LCU_LOCKFILE` is not set.
const DEFAULT_LOCKFILE: &str = "C:/Riot Games/League of Legends/lockfile";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=reject_party_owner=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let lockfile = std::env::var("LCU_LOCKFILE").unwrap_or_else(|_| DEFAULT_LOCKFILE.to_string());
    let connection = ConnectionConfig::from_lockfile_path(&lockfile)?;
    tracing::info!("Found League client at {}", connection.base_url());

    let mut config = PluginConfig::default();
    if let Ok(domain) = std::env::var("LCU_CHAT_DOMAIN") {
        config = config.with_chat_domain(domain);
    }

    // ── Connect ─────────────────────────────────────────────────────
    let api = HttpLcuClient::new(&connection)?;
    let transport = LcuWebSocket::connect(&connection).await?;

    // Bootstraps the session, then spawns the dispatch loop.
    let (mut client, mut event_rx) = PartyOwnerClient::start(api, transport, config).await?;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    PluginEvent::Ready { identity, desired_leader } => {
                        tracing::info!(
                            "Ready as summoner {identity}, desired leader: {}",
                            desired_leader.as_ref().map_or("none", |l| l.name.as_str())
                        );
                    }

                    PluginEvent::Toggled { enabled } => {
                        tracing::info!("Automatic hand-off {}", if enabled { "on" } else { "off" });
                    }

                    PluginEvent::LeaderTransferred { target, replaced } => {
                        match replaced {
                            Some(left) => tracing::info!(
                                "{} left, gave party leader to {} instead",
                                left.name,
                                target.name
                            ),
                            None => tracing::info!("Gave party leader to {}", target.name),
                        }
                    }

                    PluginEvent::TransferFailed { message } => {
                        tracing::error!("Could not hand off party leader: {message}");
                    }

                    PluginEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("client closed"));
                        break;
                    }

                    other => {
                        tracing::debug!("Event: {other:?}");
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    Ok(())
}
