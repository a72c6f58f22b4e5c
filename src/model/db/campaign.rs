use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    common::{
        campaign::{CampaignLabel, QuotaScope},
        window::WindowState,
    },
    mongodb::{optional_bson_datetime, Id},
};

pub const DEFAULT_COLOR: &str = "#3B82F6";

/// Core campaign data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCore {
    /// Display title, e.g. "Board Elections 2025".
    pub title: String,
    /// Short name.
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub logo_url: Option<String>,
    #[serde(default, with = "optional_bson_datetime")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, with = "optional_bson_datetime")]
    pub end: Option<DateTime<Utc>>,
    /// How many votes each voter may cast within this campaign's scope.
    pub votes_per_voter: u32,
    pub quota_scope: QuotaScope,
    pub label: CampaignLabel,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Reasons a campaign definition is unacceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidCampaign {
    #[error("Campaign title must not be empty")]
    EmptyTitle,
    #[error("Campaign name must not be empty")]
    EmptyName,
    #[error("Campaigns must allow at least one vote per voter")]
    ZeroQuota,
    #[error("Campaign must end after it starts")]
    EndNotAfterStart,
}

impl CampaignCore {
    /// Check the invariants every stored campaign must satisfy.
    pub fn validate(&self) -> Result<(), InvalidCampaign> {
        if self.title.trim().is_empty() {
            return Err(InvalidCampaign::EmptyTitle);
        }
        if self.name.trim().is_empty() {
            return Err(InvalidCampaign::EmptyName);
        }
        if self.votes_per_voter == 0 {
            return Err(InvalidCampaign::ZeroQuota);
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end <= start {
                return Err(InvalidCampaign::EndNotAfterStart);
            }
        }
        Ok(())
    }

    /// The window state at the given instant.
    pub fn window(&self, now: DateTime<Utc>) -> WindowState {
        WindowState::derive(now, self.start, self.end)
    }

    /// Time left until the campaign closes. Zero once it has ended,
    /// `None` if it has no end.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.end.map(|end| std::cmp::max(end - now, Duration::zero()))
    }
}

/// A campaign without an ID.
pub type NewCampaign = CampaignCore;

/// A campaign from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub campaign: CampaignCore,
}

impl Campaign {
    /// The scope key that votes in this campaign are stored under.
    pub fn scope_key(&self) -> String {
        self.quota_scope.key(self.id)
    }

    /// Votes a member may cast in this campaign's scope.
    pub fn quota(&self, global_quota: u32) -> u32 {
        self.quota_scope.quota(self.votes_per_voter, global_quota)
    }
}

impl Deref for Campaign {
    type Target = CampaignCore;

    fn deref(&self) -> &Self::Target {
        &self.campaign
    }
}

impl DerefMut for Campaign {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.campaign
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CampaignCore {
        /// A three-vote campaign that opened yesterday and closes tomorrow.
        pub fn current_example() -> Self {
            let now = Utc::now();
            Self {
                title: "Board Elections 2025".to_string(),
                name: "Board-2025".to_string(),
                description: Some("Election of the national board".to_string()),
                color: DEFAULT_COLOR.to_string(),
                logo_url: None,
                start: Some(now - Duration::days(1)),
                end: Some(now + Duration::days(1)),
                votes_per_voter: 3,
                quota_scope: QuotaScope::PerCampaign,
                label: CampaignLabel::Active,
                created_at: now,
            }
        }

        /// A campaign that opens tomorrow.
        pub fn future_example() -> Self {
            let now = Utc::now();
            Self {
                title: "Regional Council 2026".to_string(),
                name: "Council-2026".to_string(),
                start: Some(now + Duration::days(1)),
                end: Some(now + Duration::days(2)),
                votes_per_voter: 1,
                label: CampaignLabel::Scheduled,
                ..Self::current_example()
            }
        }

        /// A campaign that closed yesterday.
        pub fn past_example() -> Self {
            let now = Utc::now();
            Self {
                title: "Board Elections 2023".to_string(),
                name: "Board-2023".to_string(),
                start: Some(now - Duration::days(3)),
                end: Some(now - Duration::days(1)),
                label: CampaignLabel::Finished,
                ..Self::current_example()
            }
        }
    }
}
