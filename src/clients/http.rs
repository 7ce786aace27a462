//! REST client for the League client, built on `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};

use crate::api::LcuApi;
use crate::config::ConnectionConfig;
use crate::error::{PluginError, Result};
use crate::protocol::{ChatChannel, CurrentSummoner, LobbyMember, OutgoingChatMessage, SummonerId};

const CURRENT_SUMMONER_ENDPOINT: &str = "/lol-summoner/v1/current-summoner";
const LOBBY_MEMBERS_ENDPOINT: &str = "/lol-lobby/v2/lobby/members";
const CONVERSATIONS_ENDPOINT: &str = "/lol-chat/v1/conversations";

/// Per-request timeout. The client is local, so anything slower is stuck.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// [`LcuApi`] over HTTPS with basic auth.
///
/// Base address and credentials are fixed at construction, before any call.
#[derive(Clone)]
pub struct HttpLcuClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpLcuClient {
    /// Build a client for the given connection.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Request`] if the TLS backend cannot be set up.
    pub fn new(connection: &ConnectionConfig) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PluginError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: connection.base_url(),
            username: connection.username.clone(),
            password: connection.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.get(format!("{}{path}", self.base_url)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.post(format!("{}{path}", self.base_url)))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }
}

impl std::fmt::Debug for HttpLcuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLcuClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Send `request` and turn transport failures and non-2xx answers into errors.
async fn execute(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await.map_err(classify_send_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        body
    };
    Err(PluginError::Http {
        status: status.as_u16(),
        message,
    })
}

fn classify_send_error(error: reqwest::Error) -> PluginError {
    if error.is_connect() {
        PluginError::ConnectionRefused(error.to_string())
    } else if error.is_timeout() {
        PluginError::Timeout
    } else {
        PluginError::Request(error.to_string())
    }
}

async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| PluginError::Request(e.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Path of the message list of a chat conversation (`@` percent-encoded).
fn messages_path(channel: &ChatChannel) -> String {
    format!(
        "{CONVERSATIONS_ENDPOINT}/{}/messages",
        channel.conversation_id().replace('@', "%40")
    )
}

fn promote_path(summoner_id: SummonerId) -> String {
    format!("{LOBBY_MEMBERS_ENDPOINT}/{summoner_id}/promote")
}

#[async_trait]
impl LcuApi for HttpLcuClient {
    async fn current_summoner(&self) -> Result<SummonerId> {
        let response = execute(self.get(CURRENT_SUMMONER_ENDPOINT)).await?;
        let summoner: CurrentSummoner = json(response).await?;
        Ok(summoner.summoner_id)
    }

    async fn lobby_members(&self) -> Result<Vec<LobbyMember>> {
        let response = execute(self.get(LOBBY_MEMBERS_ENDPOINT)).await?;
        json(response).await
    }

    async fn promote(&self, summoner_id: SummonerId) -> Result<()> {
        execute(self.post(&promote_path(summoner_id))).await?;
        Ok(())
    }

    async fn post_chat_message(&self, channel: &ChatChannel, body: &str) -> Result<()> {
        let message = OutgoingChatMessage { body: body.into() };
        execute(self.post(&messages_path(channel)).json(&message)).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_client(port: u16) -> HttpLcuClient {
        let connection = ConnectionConfig::new("http", "127.0.0.1", port, "riot", "pw");
        HttpLcuClient::new(&connection).unwrap()
    }

    async fn client_for(server: &MockServer) -> HttpLcuClient {
        local_client(server.address().port())
    }

    #[tokio::test]
    async fn current_summoner_uses_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CURRENT_SUMMONER_ENDPOINT))
            .and(basic_auth("riot", "pw"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "summonerId": 42, "gameName": "Me", "puuid": "x" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = client_for(&server).await;
        assert_eq!(api.current_summoner().await.unwrap(), SummonerId(42));
    }

    #[tokio::test]
    async fn server_errors_keep_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CURRENT_SUMMONER_ENDPOINT))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let api = client_for(&server).await;
        let err = api.current_summoner().await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(!err.is_connection_refused());
    }

    #[tokio::test]
    async fn closed_port_is_connection_refused() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let api = local_client(port);

        let err = api.current_summoner().await.unwrap_err();
        assert!(err.is_connection_refused(), "got {err:?}");
    }

    #[tokio::test]
    async fn lobby_members_decodes_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(LOBBY_MEMBERS_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "summonerId": 1, "summonerName": "Me", "isLeader": false },
                { "summonerId": 2, "summonerName": "B", "isLeader": true }
            ])))
            .mount(&server)
            .await;

        let members = client_for(&server).await.lobby_members().await.unwrap();
        assert_eq!(members.len(), 2);
        assert!(members[1].is_leader);
        assert_eq!(members[1].summoner_name, "B");
    }

    #[tokio::test]
    async fn promote_posts_to_member_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/lol-lobby/v2/lobby/members/7/promote"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .promote(SummonerId(7))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn chat_message_goes_to_party_conversation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/lol-chat/v1/conversations/party-1%40sec.na1.pvp.net/messages",
            ))
            .and(body_json(json!({ "body": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let channel = ChatChannel::party("party-1", "sec.na1.pvp.net");
        client_for(&server)
            .await
            .post_chat_message(&channel, "hello")
            .await
            .unwrap();
    }

    #[test]
    fn paths() {
        assert_eq!(
            promote_path(SummonerId(5)),
            "/lol-lobby/v2/lobby/members/5/promote"
        );
        assert_eq!(
            messages_path(&ChatChannel::party("abc", "sec.euw1.pvp.net")),
            "/lol-chat/v1/conversations/abc%40sec.euw1.pvp.net/messages"
        );
    }
}
