//! Notifications emitted by a running session.

use crate::executor::TransferOutcome;
use crate::protocol::{PartyMember, SummonerId};

/// Why a leadership event did not lead to a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The local user is alone in the party.
    Alone,
    /// The local user has led since tracking began.
    AlwaysLeader,
    /// Transfers are suppressed by chat command.
    Disabled,
    /// A fresh read shows someone else leading already.
    NoLongerLeader,
    /// The fresh party read failed.
    MembershipUnavailable,
    /// Nobody is left to promote.
    NoCandidates,
}

/// Events delivered on the channel returned by
/// [`PartyOwnerClient::start`](crate::client::PartyOwnerClient::start).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    /// Bootstrap finished and both topics are subscribed.
    Ready {
        identity: SummonerId,
        desired_leader: Option<PartyMember>,
    },
    /// A chat command flipped the enabled flag.
    Toggled { enabled: bool },
    /// Someone else holds the leader role.
    LeaderObserved { leader: PartyMember },
    /// Leadership was handed to `target`.
    LeaderTransferred {
        target: PartyMember,
        /// The desired leader that had left, when a fallback was chosen.
        replaced: Option<PartyMember>,
    },
    /// A membership event was handled without promoting anyone.
    TransferSkipped { reason: SkipReason },
    /// A promote or chat call failed.
    TransferFailed { message: String },
    /// The dispatch loop stopped.
    Disconnected { reason: Option<String> },
}

impl From<TransferOutcome> for PluginEvent {
    fn from(outcome: TransferOutcome) -> Self {
        match outcome {
            TransferOutcome::Promoted { target, replaced } => {
                Self::LeaderTransferred { target, replaced }
            }
            TransferOutcome::NoLongerLeader => Self::TransferSkipped {
                reason: SkipReason::NoLongerLeader,
            },
            TransferOutcome::MembershipUnavailable => Self::TransferSkipped {
                reason: SkipReason::MembershipUnavailable,
            },
            TransferOutcome::NoCandidates => Self::TransferSkipped {
                reason: SkipReason::NoCandidates,
            },
        }
    }
}
