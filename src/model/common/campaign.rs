use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Administrator-set lifecycle label. Purely a display hint: whether votes
/// are accepted is decided by the derived window state.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignLabel {
    Active,
    #[default]
    Scheduled,
    Finished,
}

impl From<CampaignLabel> for Bson {
    fn from(label: CampaignLabel) -> Self {
        to_bson(&label).expect("Serialisation is infallible")
    }
}

/// Which votes count towards a voter's quota and per-position uniqueness.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaScope {
    /// One ballot shared by every `Global` campaign.
    Global,
    /// Each campaign is its own ballot.
    #[default]
    PerCampaign,
}

const GLOBAL_SCOPE_KEY: &str = "global";

impl QuotaScope {
    /// The key stored on each vote identifying the ballot it counts against.
    pub fn key(self, campaign_id: Id) -> String {
        match self {
            Self::Global => GLOBAL_SCOPE_KEY.to_string(),
            Self::PerCampaign => format!("campaign:{campaign_id}"),
        }
    }

    /// Votes allowed in this scope. Global campaigns all share the
    /// association-wide quota, whatever their own `votes_per_voter` says.
    pub fn quota(self, votes_per_voter: u32, global_quota: u32) -> u32 {
        match self {
            Self::Global => global_quota,
            Self::PerCampaign => votes_per_voter,
        }
    }
}
