use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A member running for a position in a specific campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    pub registration_number: String,
    pub position_id: Id,
    pub campaign_id: Id,
    /// Display order within the position, ascending. Also breaks tally ties.
    pub order: u32,
    pub specialty: Option<String>,
    pub photo_url: Option<String>,
    /// Bumped by every transaction that votes for, moves or removes this
    /// candidate, so such transactions conflict with each other.
    #[serde(default)]
    pub ledger_seq: i64,
}

pub type NewCandidate = CandidateCore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}
