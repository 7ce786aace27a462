//! Request/response boundary towards the League client.
//!
//! The plugin only needs four calls. [`LcuApi`] keeps them behind a trait so
//! the leadership logic can run against the real client
//! ([`HttpLcuClient`](crate::clients::HttpLcuClient)) or a scripted double.
//!
//! # Implementing a test double
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use reject_party_owner::api::LcuApi;
//! use reject_party_owner::error::Result;
//! use reject_party_owner::protocol::{ChatChannel, LobbyMember, SummonerId};
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl LcuApi for Offline {
//!     async fn current_summoner(&self) -> Result<SummonerId> {
//!         Ok(SummonerId(1))
//!     }
//!
//!     async fn lobby_members(&self) -> Result<Vec<LobbyMember>> {
//!         Ok(Vec::new())
//!     }
//!
//!     async fn promote(&self, _summoner_id: SummonerId) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn post_chat_message(&self, _channel: &ChatChannel, _body: &str) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{ChatChannel, LobbyMember, SummonerId};

/// The League client calls the plugin depends on.
///
/// Implementations report an unreachable client as
/// [`PluginError::ConnectionRefused`](crate::PluginError::ConnectionRefused) and
/// a non-success status as [`PluginError::Http`](crate::PluginError::Http);
/// bootstrap retries are classified on exactly those two variants.
#[async_trait]
pub trait LcuApi: Send + Sync + 'static {
    /// Identity of the logged-in summoner.
    async fn current_summoner(&self) -> Result<SummonerId>;

    /// Current members of the local party.
    async fn lobby_members(&self) -> Result<Vec<LobbyMember>>;

    /// Hand the leader role to `summoner_id`.
    async fn promote(&self, summoner_id: SummonerId) -> Result<()>;

    /// Post `body` into the given chat conversation.
    async fn post_chat_message(&self, channel: &ChatChannel, body: &str) -> Result<()>;
}
