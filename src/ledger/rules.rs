//! The acceptance rules for a single vote, as a pure function of freshly read state.
//!
//! The eligibility checker and the ledger writer both go through [`check`], so
//! an advisory answer and the authoritative one can never disagree on the
//! same inputs.

use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::model::common::window::WindowState;

/// The entity a vote referred to that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Voter,
    Campaign,
    Position,
    Candidate,
}

impl Display for Missing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Voter => "voter",
            Self::Campaign => "campaign",
            Self::Position => "position",
            Self::Candidate => "candidate",
        })
    }
}

/// Why a vote was not (or would not be) accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoteRejection {
    #[error("campaign not open ({0})")]
    CampaignClosed(WindowState),
    #[error("already voted for this position")]
    DuplicatePosition,
    #[error("quota exhausted: all {quota} votes have been cast")]
    QuotaExhausted { quota: u32 },
    #[error("{0} not found")]
    NotFound(Missing),
}

impl VoteRejection {
    /// Stable machine-readable name of the rejection.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CampaignClosed(_) => "CampaignClosed",
            Self::DuplicatePosition => "DuplicatePosition",
            Self::QuotaExhausted { .. } => "QuotaExhausted",
            Self::NotFound(_) => "NotFound",
        }
    }
}

/// Everything the rules need to know about one prospective vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallotSnapshot {
    pub window: WindowState,
    /// Votes already cast by this voter for this position in the scope.
    pub position_taken: u64,
    /// Votes already cast by this voter in the scope.
    pub votes_used: u64,
    pub quota: u32,
}

/// Reject unless the window is open.
pub fn check_window(window: WindowState) -> Result<(), VoteRejection> {
    if window.is_open() {
        Ok(())
    } else {
        Err(VoteRejection::CampaignClosed(window))
    }
}

/// Apply the rules in order: window, then per-position uniqueness, then quota.
pub fn check(snapshot: BallotSnapshot) -> Result<(), VoteRejection> {
    check_window(snapshot.window)?;
    if snapshot.position_taken > 0 {
        return Err(VoteRejection::DuplicatePosition);
    }
    if snapshot.votes_used >= u64::from(snapshot.quota) {
        return Err(VoteRejection::QuotaExhausted {
            quota: snapshot.quota,
        });
    }
    Ok(())
}

/// Votes left in the scope, never negative.
pub fn votes_remaining(votes_used: u64, quota: u32) -> u64 {
    u64::from(quota).saturating_sub(votes_used)
}
