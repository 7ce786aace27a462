//! Event transport abstraction for the League client websocket.
//!
//! The [`EventTransport`] trait is a bidirectional text channel. The plugin
//! only sends WAMP subscription frames and reads event frames; framing is the
//! implementation's concern.
//!
//! # Connection Setup
//!
//! Connection setup is NOT part of this trait. Construct a connected transport
//! externally (for example with
//! [`LcuWebSocket::connect`](crate::clients::LcuWebSocket::connect)), then pass
//! it to `PartyOwnerClient::start`.

use async_trait::async_trait;

use crate::error::PluginError;

/// A bidirectional text message transport carrying LCU websocket frames.
///
/// # Cancel Safety
///
/// [`recv`](EventTransport::recv) **MUST** be cancel-safe because the dispatch
/// loop polls it inside `tokio::select!` next to the shutdown signal.
#[async_trait]
pub trait EventTransport: Send + 'static {
    /// Send one text frame to the client.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::TransportSend`] if the frame could not be sent.
    async fn send(&mut self, message: String) -> Result<(), PluginError>;

    /// Receive the next text frame.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete frame was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed cleanly
    async fn recv(&mut self) -> Option<Result<String, PluginError>>;

    /// Close the connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources are released
    /// either way.
    async fn close(&mut self) -> Result<(), PluginError>;
}
