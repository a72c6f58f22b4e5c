use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{candidate::CandidateDescription, id::ApiId, position::PositionDescription},
    common::{
        campaign::{CampaignLabel, QuotaScope},
        window::WindowState,
    },
    db::campaign::{Campaign, NewCampaign, DEFAULT_COLOR},
};

/// A new campaign, as submitted by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSpec {
    pub title: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub votes_per_voter: Option<u32>,
    #[serde(default)]
    pub quota_scope: Option<QuotaScope>,
    #[serde(default)]
    pub label: Option<CampaignLabel>,
}

impl CampaignSpec {
    /// Fill in defaults. The result still needs validating.
    pub fn into_campaign(self, now: DateTime<Utc>) -> NewCampaign {
        NewCampaign {
            title: self.title.trim().to_string(),
            name: self.name.trim().to_string(),
            description: self.description,
            color: self.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            logo_url: self.logo_url,
            start: self.start,
            end: self.end,
            votes_per_voter: self.votes_per_voter.unwrap_or(1),
            quota_scope: self.quota_scope.unwrap_or_default(),
            label: self.label.unwrap_or_default(),
            created_at: now,
        }
    }
}

/// A partial update to an existing campaign. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignPatch {
    pub title: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub logo_url: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub votes_per_voter: Option<u32>,
    pub quota_scope: Option<QuotaScope>,
    pub label: Option<CampaignLabel>,
}

impl CampaignPatch {
    /// Merge this patch into an existing campaign.
    pub fn apply_to(self, campaign: &mut NewCampaign) {
        if let Some(title) = self.title {
            campaign.title = title.trim().to_string();
        }
        if let Some(name) = self.name {
            campaign.name = name.trim().to_string();
        }
        if self.description.is_some() {
            campaign.description = self.description;
        }
        if let Some(color) = self.color {
            campaign.color = color;
        }
        if self.logo_url.is_some() {
            campaign.logo_url = self.logo_url;
        }
        if self.start.is_some() {
            campaign.start = self.start;
        }
        if self.end.is_some() {
            campaign.end = self.end;
        }
        if let Some(votes) = self.votes_per_voter {
            campaign.votes_per_voter = votes;
        }
        if let Some(scope) = self.quota_scope {
            campaign.quota_scope = scope;
        }
        if let Some(label) = self.label {
            campaign.label = label;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LabelChange {
    pub label: CampaignLabel,
}

/// A campaign as listed publicly, with its live window state and activity counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub id: ApiId,
    pub title: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub logo_url: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub votes_per_voter: u32,
    pub quota_scope: QuotaScope,
    pub label: CampaignLabel,
    pub window: WindowState,
    /// Seconds until the campaign closes, zero once closed, absent without an end.
    pub seconds_remaining: Option<i64>,
    pub candidates: u64,
    pub votes: u64,
    pub voters: u64,
}

impl CampaignSummary {
    pub fn new(campaign: Campaign, now: DateTime<Utc>, counts: CampaignCounts) -> Self {
        let window = campaign.window(now);
        let seconds_remaining = campaign.time_remaining(now).map(|d| d.num_seconds());
        Self {
            id: campaign.id.into(),
            title: campaign.campaign.title,
            name: campaign.campaign.name,
            description: campaign.campaign.description,
            color: campaign.campaign.color,
            logo_url: campaign.campaign.logo_url,
            start: campaign.campaign.start,
            end: campaign.campaign.end,
            votes_per_voter: campaign.campaign.votes_per_voter,
            quota_scope: campaign.campaign.quota_scope,
            label: campaign.campaign.label,
            window,
            seconds_remaining,
            candidates: counts.candidates,
            votes: counts.votes,
            voters: counts.voters,
        }
    }
}

/// Activity counts for one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignCounts {
    pub candidates: u64,
    pub votes: u64,
    pub voters: u64,
}

/// A campaign together with the positions on its ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignDescription {
    #[serde(flatten)]
    pub summary: CampaignSummary,
    pub positions: Vec<BallotPosition>,
}

/// A position and the candidates running for it in one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPosition {
    pub position: PositionDescription,
    pub candidates: Vec<CandidateDescription>,
}

/// Campaign listing order: by label (active first), then most recent start first.
/// Campaigns without a start sort last within their label.
pub fn listing_order(a: &Campaign, b: &Campaign) -> std::cmp::Ordering {
    a.label
        .cmp(&b.label)
        .then_with(|| match (a.start, b.start) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        })
}
