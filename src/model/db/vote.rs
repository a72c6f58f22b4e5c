use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::voter::Region, mongodb::Id};

/// A single recorded vote. Votes are never modified once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub voter_id: Id,
    pub candidate_id: Id,
    pub position_id: Id,
    pub campaign_id: Id,
    /// Quota scope key this vote counts against.
    pub scope: String,
    /// The voter's region when the vote was cast.
    pub region: Region,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}
