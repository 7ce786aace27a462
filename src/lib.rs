//! # Reject Party Owner
//!
//! Gives League of Legends party leadership straight back. Whenever the local
//! user is promoted to party leader, the plugin promotes the member who led
//! before (or, if they left, a random other member) and says so in party chat.
//!
//! ## Features
//!
//! - **Leadership tracking** — remembers who should lead instead of you across
//!   every party membership snapshot
//! - **Stale-safe transfers** — re-reads the party before promoting and never
//!   promotes someone who left
//! - **Chat toggles** — type `enable party leader` in party chat to keep the
//!   role, `disable party leader` to hand it away again
//! - **Pluggable I/O** — [`LcuApi`] and [`EventTransport`] traits, with
//!   `reqwest` and `tokio-tungstenite` implementations behind default features
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! let connection = ConnectionConfig::from_lockfile_path(lockfile)?;
//! let api = HttpLcuClient::new(&connection)?;
//! let transport = LcuWebSocket::connect(&connection).await?;
//! let (client, events) = PartyOwnerClient::start(api, transport, PluginConfig::default()).await?;
//! ```

pub mod api;
pub mod bootstrap;
pub mod client;
pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod protocol;
pub mod retry;
pub mod tracker;
pub mod transport;

// Re-export primary types for ergonomic imports.
pub use api::LcuApi;
pub use client::PartyOwnerClient;
pub use config::{ConnectionConfig, PluginConfig};
pub use error::PluginError;
pub use event::{PluginEvent, SkipReason};
pub use protocol::{PartyMember, SummonerId};
pub use tracker::{LeadershipTracker, PHRASE_RESUME, PHRASE_SUPPRESS};
pub use transport::EventTransport;

#[cfg(feature = "lcu-http")]
pub use clients::HttpLcuClient;
#[cfg(feature = "lcu-websocket")]
pub use clients::LcuWebSocket;
