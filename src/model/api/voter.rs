use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{campaign::CampaignSummary, id::ApiId, vote::VoteDescription},
    common::voter::{Region, Role},
    db::voter::Voter,
};

/// A member's own profile. Never includes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterProfile {
    pub id: ApiId,
    pub name: String,
    pub registration_number: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub region: Region,
    pub specialty: Option<String>,
    pub role: Role,
    pub is_admin: bool,
    pub has_fully_voted: bool,
    pub registered_at: DateTime<Utc>,
}

impl From<Voter> for VoterProfile {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id.into(),
            is_admin: voter.role == Role::Administrator,
            name: voter.voter.name,
            registration_number: voter.voter.registration_number,
            email: voter.voter.email,
            date_of_birth: voter.voter.date_of_birth,
            region: voter.voter.region,
            specialty: voter.voter.specialty,
            role: voter.voter.role,
            has_fully_voted: voter.voter.has_fully_voted,
            registered_at: voter.voter.registered_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoleChange {
    pub role: Role,
}

/// Association-wide counters and recent activity for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub members: u64,
    pub members_fully_voted: u64,
    pub campaigns: u64,
    pub active_campaigns: u64,
    pub candidates: u64,
    pub votes: u64,
    /// Newest campaigns first.
    pub recent_campaigns: Vec<CampaignSummary>,
    /// Newest votes first.
    pub recent_votes: Vec<RecentVote>,
}

/// A vote with the names of everything it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentVote {
    #[serde(flatten)]
    pub vote: VoteDescription,
    pub voter: String,
    pub candidate: String,
    pub position: String,
    pub campaign: String,
}
