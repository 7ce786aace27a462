//! Hands the leader role to the desired member.
//!
//! The membership snapshot that triggered a transfer may already be stale, so
//! the executor re-reads the party before acting: it aborts if the local user
//! is no longer leader, and picks a random other member if the desired leader
//! has left.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use crate::api::LcuApi;
use crate::error::Result;
use crate::protocol::{ChatChannel, LobbyMember, PartyMember, SummonerId};
use crate::tracker::LeadershipTracker;

/// Party chat line posted after a promotion.
pub fn announcement(new_leader: &str) -> String {
    format!("{new_leader}, I do not wish to be party leader")
}

/// How a transfer attempt ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// `target` was promoted and the announcement posted. `replaced` is the
    /// desired leader that had left the party, if a fallback was chosen.
    Promoted {
        target: PartyMember,
        replaced: Option<PartyMember>,
    },
    /// The fresh snapshot shows someone else leading already.
    NoLongerLeader,
    /// The fresh snapshot could not be fetched.
    MembershipUnavailable,
    /// The desired leader left and nobody else is in the party.
    NoCandidates,
}

/// Performs one transfer attempt for a session.
#[derive(Debug)]
pub struct TransferExecutor<'a, A> {
    api: &'a A,
    identity: SummonerId,
    chat_domain: &'a str,
}

impl<'a, A: LcuApi> TransferExecutor<'a, A> {
    pub fn new(api: &'a A, identity: SummonerId, chat_domain: &'a str) -> Self {
        Self {
            api,
            identity,
            chat_domain,
        }
    }

    /// Promote `target` (or a fallback) and announce it in the party chat.
    ///
    /// A fallback is written to `tracker` before the promotion is issued, so
    /// it stays committed even if the promotion fails.
    ///
    /// # Errors
    ///
    /// Propagates failures of the promote and chat calls. A failing membership
    /// read is not an error; it yields [`TransferOutcome::MembershipUnavailable`].
    pub async fn transfer<R: Rng + ?Sized>(
        &self,
        tracker: &mut LeadershipTracker,
        target: PartyMember,
        party_id: &str,
        rng: &mut R,
    ) -> Result<TransferOutcome> {
        let members = match self.api.lobby_members().await {
            Ok(members) => members,
            Err(e) => {
                warn!("could not re-read party members, skipping transfer: {e}");
                return Ok(TransferOutcome::MembershipUnavailable);
            }
        };

        if !members
            .iter()
            .any(|m| m.summoner_id == self.identity && m.is_leader)
        {
            info!("ignoring since no longer party leader");
            return Ok(TransferOutcome::NoLongerLeader);
        }

        let (target, replaced) = if members.iter().any(|m| m.summoner_id == target.summoner_id) {
            (target, None)
        } else {
            let Some(fallback) = self.choose_fallback(&members, rng) else {
                warn!(left = %target.name, "desired leader left and nobody else is in the party");
                return Ok(TransferOutcome::NoCandidates);
            };
            info!(
                left = %target.name,
                fallback = %fallback.name,
                "desired leader isn't in the party anymore, selecting fallback"
            );
            tracker.set_desired_leader(fallback.clone());
            (fallback, Some(target))
        };

        self.api.promote(target.summoner_id).await?;
        info!(leader = %target.name, "promoted new party leader");

        let channel = ChatChannel::party(party_id, self.chat_domain);
        self.api
            .post_chat_message(&channel, &announcement(&target.name))
            .await?;

        Ok(TransferOutcome::Promoted { target, replaced })
    }

    /// Uniformly random member other than the local user.
    fn choose_fallback<R: Rng + ?Sized>(
        &self,
        members: &[LobbyMember],
        rng: &mut R,
    ) -> Option<PartyMember> {
        let candidates: Vec<&LobbyMember> = members
            .iter()
            .filter(|m| m.summoner_id != self.identity)
            .collect();
        candidates.choose(rng).map(|m| PartyMember::from(*m))
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
    use crate::error::PluginError;
    use crate::protocol::DEFAULT_CHAT_DOMAIN;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex as StdMutex;

    const ME: SummonerId = SummonerId(1);

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Members,
        Promote(SummonerId),
        Chat(String, String),
    }

    /// Scripted API: fixed membership, optional failures, recorded calls.
    struct ScriptedApi {
        members: Option<Vec<LobbyMember>>,
        fail_promote: bool,
        calls: StdMutex<Vec<Call>>,
    }

    impl ScriptedApi {
        fn new(members: Option<Vec<LobbyMember>>) -> Self {
            Self {
                members,
                fail_promote: false,
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LcuApi for ScriptedApi {
        async fn current_summoner(&self) -> Result<SummonerId> {
            Ok(ME)
        }

        async fn lobby_members(&self) -> Result<Vec<LobbyMember>> {
            self.calls.lock().unwrap().push(Call::Members);
            self.members.clone().ok_or_else(|| PluginError::Http {
                status: 404,
                message: "LOBBY_NOT_FOUND".into(),
            })
        }

        async fn promote(&self, summoner_id: SummonerId) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Promote(summoner_id));
            if self.fail_promote {
                return Err(PluginError::Http {
                    status: 500,
                    message: "promote failed".into(),
                });
            }
            Ok(())
        }

        async fn post_chat_message(&self, channel: &ChatChannel, body: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Chat(channel.conversation_id(), body.into()));
            Ok(())
        }
    }

    fn member(id: u64, name: &str, is_leader: bool) -> LobbyMember {
        LobbyMember {
            summoner_id: SummonerId(id),
            summoner_name: name.into(),
            is_leader,
        }
    }

    fn b() -> PartyMember {
        PartyMember::new(2, "B")
    }

    async fn run(api: &ScriptedApi, tracker: &mut LeadershipTracker) -> Result<TransferOutcome> {
        let mut rng = StdRng::seed_from_u64(7);
        TransferExecutor::new(api, ME, DEFAULT_CHAT_DOMAIN)
            .transfer(tracker, b(), "party-1", &mut rng)
            .await
    }

    #[tokio::test]
    async fn promotes_desired_leader_when_present() {
        let api = ScriptedApi::new(Some(vec![
            member(1, "A", true),
            member(2, "B", false),
            member(3, "C", false),
        ]));
        let mut tracker = LeadershipTracker::new(Some(b()));

        let outcome = run(&api, &mut tracker).await.unwrap();

        assert_eq!(
            outcome,
            TransferOutcome::Promoted {
                target: b(),
                replaced: None
            }
        );
        assert_eq!(
            api.calls(),
            vec![
                Call::Members,
                Call::Promote(SummonerId(2)),
                Call::Chat(
                    "party-1@sec.na1.pvp.net".into(),
                    "B, I do not wish to be party leader".into()
                ),
            ]
        );
        assert_eq!(tracker.desired_leader(), Some(&b()));
    }

    #[tokio::test]
    async fn falls_back_when_desired_leader_left() {
        let api = ScriptedApi::new(Some(vec![member(1, "A", true), member(3, "C", false)]));
        let mut tracker = LeadershipTracker::new(Some(b()));

        let outcome = run(&api, &mut tracker).await.unwrap();

        let c = PartyMember::new(3, "C");
        assert_eq!(
            outcome,
            TransferOutcome::Promoted {
                target: c.clone(),
                replaced: Some(b())
            }
        );
        assert_eq!(api.calls()[1], Call::Promote(SummonerId(3)));
        let Call::Chat(_, body) = &api.calls()[2] else {
            panic!("expected chat call");
        };
        assert!(body.contains("C"));
        assert_eq!(tracker.desired_leader(), Some(&c));
    }

    #[tokio::test]
    async fn fallback_never_picks_self_or_absent_members() {
        let members = vec![
            member(1, "A", true),
            member(4, "D", false),
            member(5, "E", false),
            member(6, "F", false),
        ];
        for seed in 0..32 {
            let api = ScriptedApi::new(Some(members.clone()));
            let mut tracker = LeadershipTracker::new(Some(b()));
            let mut rng = StdRng::seed_from_u64(seed);
            let outcome = TransferExecutor::new(&api, ME, DEFAULT_CHAT_DOMAIN)
                .transfer(&mut tracker, b(), "p", &mut rng)
                .await
                .unwrap();
            let TransferOutcome::Promoted { target, .. } = outcome else {
                panic!("expected promotion");
            };
            assert!([4, 5, 6].contains(&target.summoner_id.0));
        }
    }

    #[tokio::test]
    async fn aborts_when_no_longer_leader() {
        let api = ScriptedApi::new(Some(vec![member(1, "A", false), member(2, "B", true)]));
        let mut tracker = LeadershipTracker::new(Some(b()));

        assert_eq!(
            run(&api, &mut tracker).await.unwrap(),
            TransferOutcome::NoLongerLeader
        );
        assert_eq!(api.calls(), vec![Call::Members]);
    }

    #[tokio::test]
    async fn aborts_when_membership_unavailable() {
        let api = ScriptedApi::new(None);
        let mut tracker = LeadershipTracker::new(Some(b()));

        assert_eq!(
            run(&api, &mut tracker).await.unwrap(),
            TransferOutcome::MembershipUnavailable
        );
        assert_eq!(api.calls(), vec![Call::Members]);
    }

    #[tokio::test]
    async fn no_candidates_means_no_selection() {
        let api = ScriptedApi::new(Some(vec![member(1, "A", true)]));
        let mut tracker = LeadershipTracker::new(Some(b()));

        assert_eq!(
            run(&api, &mut tracker).await.unwrap(),
            TransferOutcome::NoCandidates
        );
        assert_eq!(api.calls(), vec![Call::Members]);
        assert_eq!(tracker.desired_leader(), Some(&b()));
    }

    #[tokio::test]
    async fn promote_failure_keeps_committed_fallback() {
        let mut api = ScriptedApi::new(Some(vec![member(1, "A", true), member(3, "C", false)]));
        api.fail_promote = true;
        let mut tracker = LeadershipTracker::new(Some(b()));

        let err = run(&api, &mut tracker).await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(tracker.desired_leader(), Some(&PartyMember::new(3, "C")));
        assert_eq!(
            api.calls(),
            vec![Call::Members, Call::Promote(SummonerId(3))]
        );
    }

    #[test]
    fn announcement_names_the_new_leader() {
        assert_eq!(
            announcement("Faker"),
            "Faker, I do not wish to be party leader"
        );
    }
}
