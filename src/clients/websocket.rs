//! League client event feed over `tokio-tungstenite`.
//!
//! [`LcuWebSocket`] is an [`EventTransport`] connected to the client's
//! websocket endpoint. The client serves `wss://` with a self-signed
//! certificate and expects the same basic auth as the REST API, so the
//! connection is set up with a permissive TLS connector and an
//! `Authorization` header.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), reject_party_owner::PluginError> {
//! use reject_party_owner::{ConnectionConfig, EventTransport, LcuWebSocket};
//!
//! let connection = ConnectionConfig::from_lockfile_path("lockfile")?;
//! let mut ws = LcuWebSocket::connect(&connection).await?;
//! ws.send(r#"[5,"OnJsonApiEvent_lol-lobby_v2_comms"]"#.to_string()).await?;
//!
//! if let Some(Ok(frame)) = ws.recv().await {
//!     println!("client said: {frame}");
//! }
//!
//! ws.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::Connector;

use crate::config::ConnectionConfig;
use crate::error::PluginError;
use crate::transport::EventTransport;

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// An [`EventTransport`] backed by the League client's websocket.
///
/// # Cancel Safety
///
/// [`recv`](EventTransport::recv) is cancel-safe: dropping its future before it
/// completes does not lose frames.
#[derive(Debug)]
pub struct LcuWebSocket {
    stream: WsStream,
    closed: bool,
}

impl LcuWebSocket {
    /// Connect and authenticate against the client's event feed.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Io`] if the connection cannot be established
    /// (the I/O [`ErrorKind`](std::io::ErrorKind) is preserved when there is
    /// one), or [`PluginError::InvalidConfig`] if the URL or credentials
    /// cannot form a request.
    pub async fn connect(connection: &ConnectionConfig) -> Result<Self, PluginError> {
        let url = connection.websocket_url();
        tracing::debug!(url = %url, "connecting to LCU websocket");

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| PluginError::InvalidConfig(format!("invalid websocket url {url}: {e}")))?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, basic_auth_header(connection)?);

        let connector = if url.starts_with("wss://") {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .build()
                .map_err(|e| PluginError::Io(std::io::Error::other(e)))?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let (stream, _response) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
                .await
                .map_err(|e| {
                    let kind = match &e {
                        tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                        _ => std::io::ErrorKind::Other,
                    };
                    PluginError::Io(std::io::Error::new(kind, e))
                })?;

        tracing::info!(url = %url, "LCU websocket connection established");

        Ok(Self {
            stream,
            closed: false,
        })
    }

    /// Wrap an already-established WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Like [`connect`](Self::connect), but fails with [`PluginError::Timeout`]
    /// if the connection is not up within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Timeout`] if the deadline elapses, or any error
    /// that [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(
        connection: &ConnectionConfig,
        timeout: std::time::Duration,
    ) -> Result<Self, PluginError> {
        tokio::time::timeout(timeout, Self::connect(connection))
            .await
            .map_err(|_| PluginError::Timeout)?
    }
}

fn basic_auth_header(connection: &ConnectionConfig) -> Result<HeaderValue, PluginError> {
    let token = STANDARD.encode(format!("{}:{}", connection.username, connection.password));
    HeaderValue::from_str(&format!("Basic {token}"))
        .map_err(|e| PluginError::InvalidConfig(format!("invalid credentials: {e}")))
}

#[async_trait]
impl EventTransport for LcuWebSocket {
    async fn send(&mut self, message: String) -> Result<(), PluginError> {
        if self.closed {
            return Err(PluginError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| PluginError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, PluginError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(PluginError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // tungstenite answers pings itself.
                }
                Message::Binary(_) => {
                    tracing::warn!("received unexpected binary WebSocket frame, skipping");
                }
                Message::Frame(_) => {
                    tracing::debug!("received raw WebSocket frame, skipping");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), PluginError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| PluginError::TransportSend(e.to_string()))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    clippy::result_large_err
)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::{client_async, MaybeTlsStream};

    #[test]
    fn lcu_websocket_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<LcuWebSocket>();
    }

    fn local(port: u16) -> ConnectionConfig {
        ConnectionConfig::new("http", "127.0.0.1", port, "riot", "pw")
    }

    /// Start a local WebSocket server that records the `Authorization` header
    /// and runs `handler` on the accepted connection.
    async fn start_mock_server<F, Fut>(handler: F) -> (u16, Arc<StdMutex<Option<String>>>)
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let auth = Arc::new(StdMutex::new(None));
        let seen = Arc::clone(&auth);

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let callback = move |req: &Request, resp: Response| {
                *seen.lock().unwrap() = req
                    .headers()
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Ok::<_, ErrorResponse>(resp)
            };
            let ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
                .await
                .unwrap();
            handler(ws).await;
        });

        (port, auth)
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = LcuWebSocket::connect(&local(port)).await.unwrap_err();
        assert!(matches!(err, PluginError::Io(_)));
    }

    #[tokio::test]
    async fn connect_sends_basic_auth() {
        let (port, auth) = start_mock_server(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let mut ws = LcuWebSocket::connect(&local(port)).await.unwrap();
        assert!(ws.recv().await.is_none());
        assert_eq!(auth.lock().unwrap().as_deref(), Some("Basic cmlvdDpwdw=="));
    }

    #[tokio::test]
    async fn subscribe_and_receive_event() {
        let (port, _auth) = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                assert_eq!(text.as_str(), r#"[5,"OnJsonApiEvent_lol-lobby_v2_comms"]"#);
            }
            ws.send(Message::Text(
                r#"[8,"OnJsonApiEvent_lol-lobby_v2_comms",{"data":null,"eventType":"Delete","uri":"/lol-lobby/v2/comms"}]"#.into(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut ws = LcuWebSocket::connect(&local(port)).await.unwrap();
        ws.send(crate::protocol::subscribe_frame(
            crate::protocol::LOBBY_COMMS_TOPIC,
        ))
        .await
        .unwrap();

        let frame = ws.recv().await.unwrap().unwrap();
        assert!(frame.starts_with("[8,"));
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let (port, _auth) = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut ws = LcuWebSocket::connect(&local(port)).await.unwrap();
        assert_eq!(ws.recv().await.unwrap().unwrap(), "after_binary");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let (port, _auth) =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut ws = LcuWebSocket::connect(&local(port)).await.unwrap();
        ws.close().await.unwrap();
        ws.close().await.unwrap();

        let err = ws.send("oops".to_string()).await.unwrap_err();
        assert!(matches!(err, PluginError::TransportClosed));
    }

    #[tokio::test]
    async fn from_stream_wraps_an_established_connection() {
        let (port, _auth) = start_mock_server(|mut ws| async move {
            ws.send(Message::Text("hello".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let tcp = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let url = format!("ws://127.0.0.1:{port}/");
        let plain = MaybeTlsStream::Plain(tcp);
        let (stream, _response) = client_async(url, plain).await.unwrap();

        let mut ws = LcuWebSocket::from_stream(stream);
        assert_eq!(ws.recv().await.unwrap().unwrap(), "hello");
        assert!(ws.recv().await.is_none());
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // The kernel completes the TCP handshake, but nobody ever answers the
        // websocket upgrade.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let timeout = std::time::Duration::from_millis(50);
        let err = LcuWebSocket::connect_with_timeout(&local(port), timeout)
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Timeout));
    }
}
