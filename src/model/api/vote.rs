use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::VoteRejection;
use crate::model::{
    api::id::ApiId,
    common::{voter::Region, window::WindowState},
    db::vote::Vote,
    mongodb::Id,
};

/// A vote, as submitted by a member. The campaign comes from the route.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: Id,
    pub position_id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDescription {
    pub id: ApiId,
    pub candidate_id: ApiId,
    pub position_id: ApiId,
    pub campaign_id: ApiId,
    pub region: Region,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for VoteDescription {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id.into(),
            candidate_id: vote.candidate_id.into(),
            position_id: vote.position_id.into(),
            campaign_id: vote.campaign_id.into(),
            region: vote.region,
            cast_at: vote.cast_at,
        }
    }
}

/// A committed vote together with where it leaves the voter's quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub vote: VoteDescription,
    pub quota: u32,
    pub votes_used: u64,
    pub votes_remaining: u64,
    /// This vote used up the quota.
    pub completed: bool,
}

/// A voter's standing in one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotStatus {
    pub campaign_id: ApiId,
    pub window: WindowState,
    pub quota: u32,
    pub votes_used: u64,
    pub votes_remaining: u64,
    pub positions_voted: Vec<ApiId>,
    pub can_vote_now: bool,
}

/// Advisory answer to "may this voter vote for this position right now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<Result<(), VoteRejection>> for Eligibility {
    fn from(result: Result<(), VoteRejection>) -> Self {
        match result {
            Ok(()) => Self {
                eligible: true,
                kind: None,
                reason: None,
            },
            Err(rejection) => Self {
                eligible: false,
                kind: Some(rejection.kind().to_string()),
                reason: Some(rejection.to_string()),
            },
        }
    }
}
