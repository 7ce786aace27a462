//! Concrete clients for a running League client.
//!
//! Each client sits behind a Cargo feature, both enabled by default:
//!
//! | Feature          | Client             | Implements                                     |
//! |------------------|--------------------|------------------------------------------------|
//! | `lcu-http`       | [`HttpLcuClient`]  | [`LcuApi`](crate::LcuApi)                      |
//! | `lcu-websocket`  | [`LcuWebSocket`]   | [`EventTransport`](crate::EventTransport)      |
//!
//! Both accept the client's self-signed certificate.
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), reject_party_owner::PluginError> {
//! use reject_party_owner::{ConnectionConfig, HttpLcuClient, LcuApi, LcuWebSocket};
//!
//! let connection = ConnectionConfig::from_lockfile_path("lockfile")?;
//! let api = HttpLcuClient::new(&connection)?;
//! println!("logged in as {}", api.current_summoner().await?);
//!
//! let mut ws = LcuWebSocket::connect(&connection).await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "lcu-http")]
pub mod http;

#[cfg(feature = "lcu-websocket")]
pub mod websocket;

#[cfg(feature = "lcu-http")]
pub use http::HttpLcuClient;

#[cfg(feature = "lcu-websocket")]
pub use websocket::LcuWebSocket;
