//! Session bootstrap: who am I, who leads, and what to listen to.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::LcuApi;
use crate::config::PluginConfig;
use crate::error::Result;
use crate::protocol::{subscribe_frame, PartyMember, SummonerId, CHAT_TOPIC, LOBBY_COMMS_TOPIC};
use crate::retry::{classify_identity_error, RetryPolicy};
use crate::transport::EventTransport;

/// What a successful bootstrap knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrapped {
    pub identity: SummonerId,
    pub desired_leader: Option<PartyMember>,
}

/// Resolve the local summoner, retrying while the client is still starting.
///
/// # Errors
///
/// Returns the first fatal error (a 5xx answer) or the last error once
/// `policy` is exhausted.
pub async fn resolve_identity<A, Sleep, SleepFut>(
    api: &A,
    policy: RetryPolicy,
    sleep: Sleep,
) -> Result<SummonerId>
where
    A: LcuApi,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let identity = policy
        .run(move || api.current_summoner(), classify_identity_error, sleep)
        .await?;
    debug!(%identity, "resolved current summoner");
    Ok(identity)
}

/// The member currently leading the party, if it can be read and is not
/// `identity`.
///
/// Never fails: not being in a party, leading it yourself, or the read
/// failing all mean "no leader known".
pub async fn resolve_current_leader<A: LcuApi>(
    api: &A,
    identity: SummonerId,
) -> Option<PartyMember> {
    match api.lobby_members().await {
        Ok(members) => members
            .iter()
            .find(|member| member.is_leader && member.summoner_id != identity)
            .map(PartyMember::from),
        Err(e) => {
            warn!("could not read current party leader: {e}");
            None
        }
    }
}

/// Subscribe `transport` to the chat and party topics.
///
/// # Errors
///
/// Propagates transport send failures.
pub async fn subscribe<T: EventTransport>(transport: &mut T) -> Result<()> {
    for topic in [CHAT_TOPIC, LOBBY_COMMS_TOPIC] {
        transport.send(subscribe_frame(topic)).await?;
        debug!(topic, "subscribed");
    }
    Ok(())
}

/// Run the whole bootstrap sequence against a live client.
///
/// # Errors
///
/// Fails if the identity cannot be resolved or the subscriptions cannot be
/// sent.
pub async fn bootstrap<A, T>(
    api: &A,
    transport: &mut T,
    config: &PluginConfig,
) -> Result<Bootstrapped>
where
    A: LcuApi,
    T: EventTransport,
{
    let policy = RetryPolicy::new(config.identity_retry_attempts, config.identity_retry_delay);
    let identity = resolve_identity(api, policy, tokio::time::sleep).await?;
    let desired_leader = resolve_current_leader(api, identity).await;
    subscribe(transport).await?;

    info!(
        %identity,
        leader = desired_leader.as_ref().map(|l| l.name.as_str()),
        "is ready"
    );
    Ok(Bootstrapped {
        identity,
        desired_leader,
    })
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
    use crate::error::PluginError;
    use crate::protocol::{ChatChannel, LobbyMember};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    struct ScriptedApi {
        identity: StdMutex<VecDeque<Result<SummonerId>>>,
        members: Option<Vec<LobbyMember>>,
    }

    impl ScriptedApi {
        fn new(identity: Vec<Result<SummonerId>>, members: Option<Vec<LobbyMember>>) -> Self {
            Self {
                identity: StdMutex::new(identity.into()),
                members,
            }
        }
    }

    #[async_trait]
    impl LcuApi for ScriptedApi {
        async fn current_summoner(&self) -> Result<SummonerId> {
            self.identity
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(PluginError::ConnectionRefused("script exhausted".into())))
        }

        async fn lobby_members(&self) -> Result<Vec<LobbyMember>> {
            self.members.clone().ok_or(PluginError::Http {
                status: 404,
                message: "not in a party".into(),
            })
        }

        async fn promote(&self, _summoner_id: SummonerId) -> Result<()> {
            unreachable!("bootstrap never promotes")
        }

        async fn post_chat_message(&self, _channel: &ChatChannel, _body: &str) -> Result<()> {
            unreachable!("bootstrap never chats")
        }
    }

    fn refused() -> Result<SummonerId> {
        Err(PluginError::ConnectionRefused("connect ECONNREFUSED".into()))
    }

    fn member(id: u64, name: &str, is_leader: bool) -> LobbyMember {
        LobbyMember {
            summoner_id: SummonerId(id),
            summoner_name: name.into(),
            is_leader,
        }
    }

    #[tokio::test]
    async fn identity_waits_between_refused_attempts() {
        let api = ScriptedApi::new(vec![refused(), refused(), Ok(SummonerId(9))], None);
        let mut sleeps = Vec::new();
        let policy = RetryPolicy::new(20, Duration::from_secs(1));

        let identity = resolve_identity(&api, policy, |d| {
            sleeps.push(d);
            async {}
        })
        .await
        .unwrap();

        assert_eq!(identity, SummonerId(9));
        assert_eq!(sleeps, vec![Duration::from_secs(1); 2]);
    }

    #[tokio::test]
    async fn identity_gives_up_on_server_error() {
        let api = ScriptedApi::new(
            vec![Err(PluginError::Http {
                status: 500,
                message: "boom".into(),
            })],
            None,
        );
        let mut sleeps = 0;

        let err = resolve_identity(&api, RetryPolicy::new(20, Duration::ZERO), |_| {
            sleeps += 1;
            async {}
        })
        .await
        .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(sleeps, 0);
    }

    #[tokio::test]
    async fn current_leader_is_the_flagged_member() {
        let api = ScriptedApi::new(
            vec![],
            Some(vec![member(1, "Me", false), member(2, "Bee", true)]),
        );
        assert_eq!(
            resolve_current_leader(&api, SummonerId(1)).await,
            Some(PartyMember::new(2, "Bee"))
        );
    }

    #[tokio::test]
    async fn current_leader_ignores_self_and_failures() {
        let leading = ScriptedApi::new(
            vec![],
            Some(vec![member(1, "Me", true), member(2, "Bee", false)]),
        );
        assert_eq!(resolve_current_leader(&leading, SummonerId(1)).await, None);

        let no_party = ScriptedApi::new(vec![], None);
        assert_eq!(resolve_current_leader(&no_party, SummonerId(1)).await, None);
    }
}
