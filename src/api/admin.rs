use std::collections::HashMap;

use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};
use serde::Deserialize;

use super::campaigns::campaign_counts;
use crate::{
    error::{Error, Result},
    ledger::VoteLedger,
    model::{
        api::{
            auth::AuthToken,
            campaign::CampaignSummary,
            voter::{RecentVote, RoleChange, Statistics, VoterProfile},
        },
        common::{campaign::CampaignLabel, voter::Role},
        db::{
            admin::Admin, campaign::Campaign, candidate::Candidate, position::Position, vote::Vote,
            voter::Voter,
        },
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![statistics, change_role]
}

const RECENT_CAMPAIGNS: i64 = 5;
const RECENT_VOTES: i64 = 10;

#[get("/admin/stats")]
#[allow(clippy::too_many_arguments)]
async fn statistics(
    _token: AuthToken<Admin>,
    voters: Coll<Voter>,
    campaigns: Coll<Campaign>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    ledger: &State<VoteLedger>,
) -> Result<Json<Statistics>> {
    let newest = |field: &str, limit: i64| {
        FindOptions::builder()
            .sort(doc! { field: -1 })
            .limit(limit)
            .build()
    };

    let latest: Vec<Campaign> = campaigns
        .find(None, newest("created_at", RECENT_CAMPAIGNS))
        .await?
        .try_collect()
        .await?;
    let now = ledger.now();
    let mut recent_campaigns = Vec::with_capacity(latest.len());
    for campaign in latest {
        let counts = campaign_counts(campaign.id, &candidates, &votes).await?;
        recent_campaigns.push(CampaignSummary::new(campaign, now, counts));
    }

    let latest: Vec<Vote> = votes
        .find(None, newest("cast_at", RECENT_VOTES))
        .await?
        .try_collect()
        .await?;
    let voter_names = names(&voters, latest.iter().map(|vote| vote.voter_id)).await?;
    let candidate_names = names(&candidates, latest.iter().map(|vote| vote.candidate_id)).await?;
    let position_names = names(&positions, latest.iter().map(|vote| vote.position_id)).await?;
    let campaign_names = names(&campaigns, latest.iter().map(|vote| vote.campaign_id)).await?;
    let name_of =
        |names: &HashMap<Id, String>, id: Id| names.get(&id).cloned().unwrap_or_default();
    let recent_votes = latest
        .into_iter()
        .map(|vote| RecentVote {
            voter: name_of(&voter_names, vote.voter_id),
            candidate: name_of(&candidate_names, vote.candidate_id),
            position: name_of(&position_names, vote.position_id),
            campaign: name_of(&campaign_names, vote.campaign_id),
            vote: vote.into(),
        })
        .collect();

    let active = doc! { "label": CampaignLabel::Active };
    Ok(Json(Statistics {
        members: voters.count_documents(None, None).await?,
        members_fully_voted: voters
            .count_documents(doc! { "has_fully_voted": true }, None)
            .await?,
        campaigns: campaigns.count_documents(None, None).await?,
        active_campaigns: campaigns.count_documents(active, None).await?,
        candidates: candidates.count_documents(None, None).await?,
        votes: votes.count_documents(None, None).await?,
        recent_campaigns,
        recent_votes,
    }))
}

/// The `name` of a document, and nothing else.
#[derive(Deserialize)]
struct Named {
    #[serde(rename = "_id")]
    id: Id,
    name: String,
}

/// Look up the names of the given documents in `coll`.
async fn names<T>(coll: &Coll<T>, ids: impl Iterator<Item = Id>) -> Result<HashMap<Id, String>> {
    let ids: Vec<Id> = ids.collect();
    let projection = FindOptions::builder().projection(doc! { "name": 1 }).build();
    let found = coll
        .clone_with_type::<Named>()
        .find(doc! { "_id": { "$in": ids } }, projection)
        .await?
        .map_ok(|named| (named.id, named.name))
        .try_collect()
        .await?;
    Ok(found)
}

#[put("/admin/voters/<voter_id>/role", data = "<change>", format = "json")]
async fn change_role(
    _token: AuthToken<Admin>,
    voter_id: Id,
    change: Json<RoleChange>,
    voters: Coll<Voter>,
) -> Result<Json<VoterProfile>> {
    let mut voter = voters
        .find_one(voter_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Member"))?;

    // Prevent demoting the last administrator.
    if voter.role == Role::Administrator && change.role != Role::Administrator {
        let admins = voters
            .count_documents(doc! { "role": Role::Administrator }, None)
            .await?;
        if admins == 1 {
            return Err(Error::Status(
                Status::UnprocessableEntity,
                "Cannot demote the last administrator!".to_string(),
            ));
        }
    }

    let update = doc! {
        "$set": { "role": change.role },
    };
    voters.update_one(voter_id.as_doc(), update, None).await?;
    info!("Member {voter_id} is now {:?}", change.role);

    voter.role = change.role;
    Ok(Json(voter.into()))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rocket::{http::ContentType, local::asynchronous::Client};

    use crate::model::{
        api::auth::Registration,
        common::voter::Region,
        db::{
            campaign::NewCampaign, candidate::CandidateCore, position::PositionCore,
            vote::VoteCore, voter::VoterCore,
        },
    };

    use super::*;

    async fn set_role<'c>(client: &'c Client, voter_id: Id, role: &str) -> Status {
        client
            .put(uri!(change_role(voter_id)))
            .header(ContentType::JSON)
            .body(format!(r#"{{"role":"{role}"}}"#))
            .dispatch()
            .await
            .status()
    }

    #[backend_test(admin)]
    async fn promote_and_demote(client: Client, voters: Coll<Voter>) {
        let member = Voter {
            id: Id::new(),
            voter: VoterCore::example(),
        };
        voters.insert_one(&member, None).await.unwrap();

        assert_eq!(Status::Ok, set_role(&client, member.id, "administrator").await);
        let stored = voters.find_one(member.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Administrator);

        assert_eq!(Status::Ok, set_role(&client, member.id, "standard").await);
        assert_eq!(
            Status::NotFound,
            set_role(&client, Id::new(), "administrator").await
        );

        // The logged-in administrator is now the only one.
        let filter = doc! {
            "registration_number": Registration::admin_example().registration_number,
        };
        let me = voters
            .find_one(filter, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            Status::UnprocessableEntity,
            set_role(&client, me.id, "standard").await
        );
    }

    #[backend_test(admin)]
    async fn statistics_count_everything(client: Client, voters: Coll<Voter>) {
        let mut member = Voter {
            id: Id::new(),
            voter: VoterCore::example(),
        };
        member.has_fully_voted = true;
        voters.insert_one(&member, None).await.unwrap();

        let response = client.get(uri!(statistics)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let stats: Statistics = response.into_json().await.unwrap();
        assert_eq!(
            stats,
            Statistics {
                members: 2,
                members_fully_voted: 1,
                ..Default::default()
            }
        );
    }

    #[backend_test(admin)]
    async fn statistics_list_recent_activity(
        client: Client,
        voters: Coll<Voter>,
        campaigns: Coll<Campaign>,
        positions: Coll<Position>,
        candidates: Coll<Candidate>,
        votes: Coll<Vote>,
    ) {
        let member = Voter {
            id: Id::new(),
            voter: VoterCore::example(),
        };
        voters.insert_one(&member, None).await.unwrap();
        let president = Position {
            id: Id::new(),
            position: PositionCore::president(),
        };
        positions.insert_one(&president, None).await.unwrap();

        // Seven campaigns created a minute apart, one candidate and vote each.
        let start = Utc::now() - Duration::hours(1);
        let mut created = vec![];
        for i in 0..7 {
            let campaign = Campaign {
                id: Id::new(),
                campaign: NewCampaign {
                    name: format!("Board-{i}"),
                    created_at: start + Duration::minutes(i),
                    ..NewCampaign::current_example()
                },
            };
            campaigns.insert_one(&campaign, None).await.unwrap();
            let candidate = Candidate {
                id: Id::new(),
                candidate: CandidateCore::example("Alvarez", 1, president.id, campaign.id),
            };
            candidates.insert_one(&candidate, None).await.unwrap();
            for voter_id in [member.id, Id::new()] {
                let vote = Vote {
                    id: Id::new(),
                    vote: VoteCore {
                        voter_id,
                        candidate_id: candidate.id,
                        position_id: president.id,
                        campaign_id: campaign.id,
                        scope: campaign.scope_key(),
                        region: Region {
                            department: 1,
                            municipality: 101,
                        },
                        cast_at: start + Duration::minutes(i) + Duration::seconds(1),
                    },
                };
                votes.insert_one(&vote, None).await.unwrap();
            }
            created.push(campaign.id);
        }

        let response = client.get(uri!(statistics)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let stats: Statistics = response.into_json().await.unwrap();
        assert_eq!(stats.votes, 14);

        let recent: Vec<Id> = stats.recent_campaigns.iter().map(|c| c.id.into()).collect();
        let expected: Vec<Id> = created.iter().rev().take(5).copied().collect();
        assert_eq!(recent, expected);
        assert_eq!(stats.recent_campaigns[0].candidates, 1);
        assert_eq!(stats.recent_campaigns[0].votes, 2);
        assert_eq!(stats.recent_campaigns[0].voters, 2);

        assert_eq!(stats.recent_votes.len(), 10);
        let newest = &stats.recent_votes[0];
        assert_eq!(Id::from(newest.vote.campaign_id), created[6]);
        assert_eq!(newest.campaign, "Board-6");
        assert_eq!(newest.candidate, "Alvarez");
        assert_eq!(newest.position, "President");
        let named: Vec<_> = stats
            .recent_votes
            .iter()
            .filter(|vote| vote.voter == member.name)
            .collect();
        assert_eq!(named.len(), 5);
    }

    #[backend_test(voter)]
    async fn members_cannot_see_statistics(client: Client) {
        let response = client.get(uri!(statistics)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }
}
