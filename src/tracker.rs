//! Leadership bookkeeping.
//!
//! [`LeadershipTracker`] owns the two pieces of session state: the desired
//! leader ("who should be leader instead of me") and the enabled flag. It makes
//! every decision synchronously; the network work that follows a
//! [`MembershipDecision::Transfer`] lives in [`executor`](crate::executor).

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::protocol::{ChatMessage, EventType, LobbyComms, PartyMember, SummonerId};

/// Chat phrase that turns automatic transfers **off**.
///
/// Read as "enable being party leader": matching it stops the hand-off.
pub const PHRASE_SUPPRESS: &str = "enable party (leader|owner)";

/// Chat phrase that turns automatic transfers back **on**.
pub const PHRASE_RESUME: &str = "disable party (leader|owner)";

#[allow(clippy::expect_used)]
static SUPPRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){PHRASE_SUPPRESS}")).expect("suppress phrase is a valid regex")
});

#[allow(clippy::expect_used)]
static RESUME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){PHRASE_RESUME}")).expect("resume phrase is a valid regex")
});

/// A self-issued chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// Stop handing leadership away.
    Suppress,
    /// Hand leadership away again.
    Resume,
}

impl ChatCommand {
    /// Match a message body against the command phrases.
    ///
    /// Matching is case-insensitive and unanchored; the suppress phrase wins
    /// when both appear.
    pub fn parse(body: &str) -> Option<Self> {
        if SUPPRESS_RE.is_match(body) {
            Some(Self::Suppress)
        } else if RESUME_RE.is_match(body) {
            Some(Self::Resume)
        } else {
            None
        }
    }
}

/// Outcome of feeding one membership snapshot to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipDecision {
    /// Only the local user is in the party.
    Alone,
    /// Someone else leads; the desired leader now points at them.
    ObservedLeader(Option<PartyMember>),
    /// The local user leads but nobody else ever did.
    AlwaysLeader,
    /// The local user leads, but transfers are suppressed.
    Disabled { desired: PartyMember },
    /// Hand leadership to `target`.
    Transfer { target: PartyMember },
}

/// Desired leader and enabled flag of one session.
#[derive(Debug, Clone)]
pub struct LeadershipTracker {
    desired_leader: Option<PartyMember>,
    enabled: bool,
}

impl LeadershipTracker {
    /// A freshly bootstrapped tracker: enabled, with the leader seen at startup.
    pub fn new(desired_leader: Option<PartyMember>) -> Self {
        Self {
            desired_leader,
            enabled: true,
        }
    }

    pub fn desired_leader(&self) -> Option<&PartyMember> {
        self.desired_leader.as_ref()
    }

    pub fn set_desired_leader(&mut self, leader: PartyMember) {
        self.desired_leader = Some(leader);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Decide what a membership snapshot means for `identity`.
    ///
    /// Bookkeeping of the desired leader happens here regardless of the enabled
    /// flag. The returned target is an owned copy, so later snapshots cannot
    /// change it while a transfer is in flight.
    pub fn on_membership_change(
        &mut self,
        identity: SummonerId,
        snapshot: &LobbyComms,
    ) -> MembershipDecision {
        if snapshot.party_size() <= 1 {
            debug!("alone in the party, no one else to make party leader");
            return MembershipDecision::Alone;
        }

        if !snapshot.is_leader(identity) {
            let leader = snapshot.leader().map(PartyMember::from);
            match &leader {
                Some(leader) => {
                    if self.desired_leader.as_ref() != Some(leader) {
                        info!(leader = %leader.name, "someone else was made party leader");
                    }
                    self.desired_leader = Some(leader.clone());
                }
                None => debug!("snapshot has no party leader, keeping desired leader"),
            }
            return MembershipDecision::ObservedLeader(leader);
        }

        let Some(desired) = self.desired_leader.clone() else {
            debug!("always been party leader, ignoring");
            return MembershipDecision::AlwaysLeader;
        };
        info!(desired = %desired.name, "made party leader");

        if !self.enabled {
            debug!("plugin disabled, keeping party leader");
            return MembershipDecision::Disabled { desired };
        }

        MembershipDecision::Transfer { target: desired }
    }

    /// Apply a chat event; returns the command that changed the flag, if any.
    ///
    /// Only newly created party-chat messages written by `identity` count.
    pub fn on_chat_message(
        &mut self,
        identity: SummonerId,
        event_type: EventType,
        message: &ChatMessage,
    ) -> Option<ChatCommand> {
        if event_type != EventType::Create
            || !message.is_groupchat()
            || message.from_summoner_id != identity
        {
            return None;
        }

        let command = ChatCommand::parse(&message.body)?;
        match command {
            ChatCommand::Suppress => {
                self.enabled = false;
                info!("disabling plugin");
            }
            ChatCommand::Resume => {
                self.enabled = true;
                info!("enabling plugin");
            }
        }
        Some(command)
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
    use crate::protocol::{CommsPlayer, PartyRole};
    use std::collections::HashMap;

    const ME: SummonerId = SummonerId(1);

    fn player(id: u64, name: &str, role: PartyRole) -> CommsPlayer {
        CommsPlayer {
            summoner_id: SummonerId(id),
            game_name: name.into(),
            display_name: String::new(),
            role,
        }
    }

    fn snapshot(players: Vec<CommsPlayer>) -> LobbyComms {
        LobbyComms {
            party_id: "party".into(),
            players: players
                .into_iter()
                .map(|p| (format!("puuid-{}", p.summoner_id), p))
                .collect::<HashMap<_, _>>(),
        }
    }

    fn me_leading_with_b() -> LobbyComms {
        snapshot(vec![
            player(1, "Me", PartyRole::Leader),
            player(2, "B", PartyRole::Member),
        ])
    }

    fn message(kind: &str, from: u64, body: &str) -> ChatMessage {
        ChatMessage {
            kind: kind.into(),
            from_summoner_id: SummonerId(from),
            body: body.into(),
        }
    }

    #[test]
    fn alone_never_transfers() {
        let solo = snapshot(vec![player(1, "Me", PartyRole::Leader)]);
        for desired in [None, Some(PartyMember::new(2, "B"))] {
            for enabled in [true, false] {
                let mut tracker = LeadershipTracker::new(desired.clone());
                tracker.set_enabled(enabled);
                assert_eq!(
                    tracker.on_membership_change(ME, &solo),
                    MembershipDecision::Alone
                );
                assert_eq!(tracker.desired_leader(), desired.as_ref());
            }
        }
    }

    #[test]
    fn empty_snapshot_is_alone() {
        let mut tracker = LeadershipTracker::new(None);
        assert_eq!(
            tracker.on_membership_change(ME, &snapshot(vec![])),
            MembershipDecision::Alone
        );
    }

    #[test]
    fn records_other_leader() {
        let mut tracker = LeadershipTracker::new(None);
        let comms = snapshot(vec![
            player(1, "Me", PartyRole::Member),
            player(2, "B", PartyRole::Leader),
        ]);
        let decision = tracker.on_membership_change(ME, &comms);
        assert_eq!(
            decision,
            MembershipDecision::ObservedLeader(Some(PartyMember::new(2, "B")))
        );
        assert_eq!(tracker.desired_leader(), Some(&PartyMember::new(2, "B")));
    }

    #[test]
    fn records_other_leader_while_disabled() {
        let mut tracker = LeadershipTracker::new(None);
        tracker.set_enabled(false);
        let comms = snapshot(vec![
            player(1, "Me", PartyRole::Member),
            player(3, "C", PartyRole::Leader),
        ]);
        tracker.on_membership_change(ME, &comms);
        assert_eq!(tracker.desired_leader(), Some(&PartyMember::new(3, "C")));
    }

    #[test]
    fn leaderless_snapshot_keeps_desired() {
        let mut tracker = LeadershipTracker::new(Some(PartyMember::new(2, "B")));
        let comms = snapshot(vec![
            player(1, "Me", PartyRole::Member),
            player(3, "C", PartyRole::Invited),
        ]);
        assert_eq!(
            tracker.on_membership_change(ME, &comms),
            MembershipDecision::ObservedLeader(None)
        );
        assert_eq!(tracker.desired_leader(), Some(&PartyMember::new(2, "B")));
    }

    #[test]
    fn unset_desired_leader_never_transfers() {
        let mut tracker = LeadershipTracker::new(None);
        assert_eq!(
            tracker.on_membership_change(ME, &me_leading_with_b()),
            MembershipDecision::AlwaysLeader
        );
        assert!(tracker.desired_leader().is_none());
    }

    #[test]
    fn disabled_never_transfers() {
        let mut tracker = LeadershipTracker::new(Some(PartyMember::new(2, "B")));
        tracker.set_enabled(false);
        assert_eq!(
            tracker.on_membership_change(ME, &me_leading_with_b()),
            MembershipDecision::Disabled {
                desired: PartyMember::new(2, "B")
            }
        );
    }

    #[test]
    fn becoming_leader_transfers_to_desired() {
        let mut tracker = LeadershipTracker::new(Some(PartyMember::new(2, "B")));
        assert_eq!(
            tracker.on_membership_change(ME, &me_leading_with_b()),
            MembershipDecision::Transfer {
                target: PartyMember::new(2, "B")
            }
        );
    }

    #[test]
    fn chat_commands_toggle_flag() {
        let mut tracker = LeadershipTracker::new(None);

        let cmd = tracker.on_chat_message(
            ME,
            EventType::Create,
            &message("groupchat", 1, "ENABLE PARTY OWNER"),
        );
        assert_eq!(cmd, Some(ChatCommand::Suppress));
        assert!(!tracker.is_enabled());

        let cmd = tracker.on_chat_message(
            ME,
            EventType::Create,
            &message("groupchat", 1, "disable party leader"),
        );
        assert_eq!(cmd, Some(ChatCommand::Resume));
        assert!(tracker.is_enabled());
    }

    #[test]
    fn chat_commands_ignore_others_and_non_party_chat() {
        let mut tracker = LeadershipTracker::new(None);
        let suppress = "enable party leader";

        for (event_type, msg) in [
            (EventType::Create, message("groupchat", 99, suppress)),
            (EventType::Create, message("chat", 1, suppress)),
            (EventType::Update, message("groupchat", 1, suppress)),
            (EventType::Create, message("groupchat", 1, "gl hf")),
        ] {
            assert_eq!(tracker.on_chat_message(ME, event_type, &msg), None);
            assert!(tracker.is_enabled());
        }
    }

    #[test]
    fn phrases_match_inside_longer_messages() {
        assert_eq!(
            ChatCommand::parse("ok please Enable Party Leader now"),
            Some(ChatCommand::Suppress)
        );
        assert_eq!(
            ChatCommand::parse("disable party owner!"),
            Some(ChatCommand::Resume)
        );
        assert_eq!(ChatCommand::parse("enable party"), None);
    }
}
