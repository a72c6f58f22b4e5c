use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::candidate::{Candidate, NewCandidate},
    mongodb::Id,
};

/// A new candidate, as submitted by an administrator. The campaign comes from the route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub registration_number: String,
    pub position_id: Id,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl CandidateSpec {
    pub fn into_candidate(self, campaign_id: Id) -> NewCandidate {
        NewCandidate {
            name: self.name.trim().to_string(),
            registration_number: self.registration_number.trim().to_string(),
            position_id: self.position_id,
            campaign_id,
            order: self.order,
            specialty: self.specialty,
            photo_url: self.photo_url,
            ledger_seq: 0,
        }
    }
}

/// A partial update to a candidate. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidatePatch {
    pub name: Option<String>,
    pub registration_number: Option<String>,
    pub position_id: Option<Id>,
    pub order: Option<u32>,
    pub specialty: Option<String>,
    pub photo_url: Option<String>,
}

impl CandidatePatch {
    pub fn apply_to(self, candidate: &mut NewCandidate) {
        if let Some(name) = self.name {
            candidate.name = name.trim().to_string();
        }
        if let Some(number) = self.registration_number {
            candidate.registration_number = number.trim().to_string();
        }
        if let Some(position_id) = self.position_id {
            candidate.position_id = position_id;
        }
        if let Some(order) = self.order {
            candidate.order = order;
        }
        if self.specialty.is_some() {
            candidate.specialty = self.specialty;
        }
        if self.photo_url.is_some() {
            candidate.photo_url = self.photo_url;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub registration_number: String,
    pub position_id: ApiId,
    pub campaign_id: ApiId,
    pub order: u32,
    pub specialty: Option<String>,
    pub photo_url: Option<String>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            registration_number: candidate.candidate.registration_number,
            position_id: candidate.candidate.position_id.into(),
            campaign_id: candidate.candidate.campaign_id.into(),
            order: candidate.candidate.order,
            specialty: candidate.candidate.specialty,
            photo_url: candidate.candidate.photo_url,
        }
    }
}
