use serde::{Deserialize, Serialize};

use crate::model::api::{candidate::CandidateDescription, position::PositionDescription};

/// Tallied results for one position, candidates ranked best first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionResults {
    pub position: PositionDescription,
    pub candidates: Vec<CandidateResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate: CandidateDescription,
    pub votes: u64,
}
