use mongodb::{bson::doc, options::FindOptions, Client, ClientSession};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::{Error, Result},
    ledger::VoteLedger,
    model::{
        api::{
            auth::AuthToken,
            campaign::{
                listing_order, BallotPosition, CampaignCounts, CampaignDescription,
                CampaignPatch, CampaignSpec, CampaignSummary, LabelChange,
            },
        },
        db::{
            admin::Admin, campaign::Campaign, candidate::Candidate, position::Position, vote::Vote,
        },
        mongodb::{
            transaction::{finish, retry_transient},
            Coll, Id,
        },
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        list_campaigns,
        get_campaign,
        create_campaign,
        update_campaign,
        set_label,
        delete_campaign,
    ]
}

/// Count the candidates, votes and distinct voters of a campaign.
pub(super) async fn campaign_counts(
    campaign_id: Id,
    candidates: &Coll<Candidate>,
    votes: &Coll<Vote>,
) -> Result<CampaignCounts> {
    let filter = doc! { "campaign_id": campaign_id };
    Ok(CampaignCounts {
        candidates: candidates.count_documents(filter.clone(), None).await?,
        votes: votes.count_documents(filter.clone(), None).await?,
        voters: votes.distinct("voter_id", filter, None).await?.len() as u64,
    })
}

#[get("/campaigns")]
async fn list_campaigns(
    campaigns: Coll<Campaign>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    ledger: &State<VoteLedger>,
) -> Result<Json<Vec<CampaignSummary>>> {
    let mut all: Vec<Campaign> = campaigns.find(None, None).await?.try_collect().await?;
    all.sort_by(listing_order);

    let now = ledger.now();
    let mut summaries = Vec::with_capacity(all.len());
    for campaign in all {
        let counts = campaign_counts(campaign.id, &candidates, &votes).await?;
        summaries.push(CampaignSummary::new(campaign, now, counts));
    }
    Ok(Json(summaries))
}

#[get("/campaigns/<campaign_id>")]
async fn get_campaign(
    campaign_id: Id,
    campaigns: Coll<Campaign>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    ledger: &State<VoteLedger>,
) -> Result<Json<CampaignDescription>> {
    let campaign = campaigns
        .find_one(campaign_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Campaign"))?;

    let sort = FindOptions::builder()
        .sort(doc! { "order": 1, "name": 1 })
        .build();
    let all_positions: Vec<Position> = positions
        .find(None, sort.clone())
        .await?
        .try_collect()
        .await?;
    let mut running: Vec<Candidate> = candidates
        .find(doc! { "campaign_id": campaign_id }, sort)
        .await?
        .try_collect()
        .await?;

    // Only the positions someone is running for appear on the ballot.
    let mut ballot = Vec::new();
    for position in all_positions {
        let (these, rest): (Vec<_>, Vec<_>) = running
            .into_iter()
            .partition(|candidate| candidate.position_id == position.id);
        running = rest;
        if !these.is_empty() {
            ballot.push(BallotPosition {
                position: position.into(),
                candidates: these.into_iter().map(Into::into).collect(),
            });
        }
    }

    let counts = campaign_counts(campaign_id, &candidates, &votes).await?;
    Ok(Json(CampaignDescription {
        summary: CampaignSummary::new(campaign, ledger.now(), counts),
        positions: ballot,
    }))
}

#[post("/campaigns", data = "<spec>", format = "json")]
async fn create_campaign(
    _token: AuthToken<Admin>,
    spec: Json<CampaignSpec>,
    campaigns: Coll<Campaign>,
    ledger: &State<VoteLedger>,
) -> Result<(Status, Json<CampaignSummary>)> {
    let now = ledger.now();
    let campaign = Campaign {
        id: Id::new(),
        campaign: spec.0.into_campaign(now),
    };
    campaign.validate()?;
    campaigns.insert_one(&campaign, None).await?;
    info!("Created campaign {}", campaign.id);

    let summary = CampaignSummary::new(campaign, now, CampaignCounts::default());
    Ok((Status::Created, Json(summary)))
}

#[patch("/campaigns/<campaign_id>", data = "<patch>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn update_campaign(
    _token: AuthToken<Admin>,
    campaign_id: Id,
    patch: Json<CampaignPatch>,
    campaigns: Coll<Campaign>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
    config: &State<Config>,
    ledger: &State<VoteLedger>,
) -> Result<Json<CampaignSummary>> {
    let patch = patch.into_inner();
    let (colls, db_client) = ((&campaigns, &candidates, &votes), db_client.inner());
    let campaign = retry_transient(
        "Campaign update",
        config.transaction_retry_window(),
        move || {
            let patch = patch.clone();
            async move {
                let mut session = db_client.start_session(None).await?;
                session.start_transaction(None).await?;
                let result = apply_patch(campaign_id, patch, colls, &mut session).await;
                finish(&mut session, result).await
            }
        },
    )
    .await?;

    let counts = campaign_counts(campaign_id, &candidates, &votes).await?;
    Ok(Json(CampaignSummary::new(campaign, ledger.now(), counts)))
}

/// Patch and store a campaign inside `session`'s transaction.
async fn apply_patch(
    campaign_id: Id,
    patch: CampaignPatch,
    (campaigns, candidates, votes): (&Coll<Campaign>, &Coll<Candidate>, &Coll<Vote>),
    session: &mut ClientSession,
) -> Result<Campaign> {
    let mut campaign = campaigns
        .find_one_with_session(campaign_id.as_doc(), None, session)
        .await?
        .ok_or_else(|| Error::not_found("Campaign"))?;
    let old_scope = campaign.quota_scope;

    patch.apply_to(&mut campaign.campaign);
    campaign.validate()?;

    // Existing votes are keyed by the old scope. Touching every candidate
    // makes a vote cast concurrently for this campaign conflict with us.
    if campaign.quota_scope != old_scope {
        let filter = doc! { "campaign_id": campaign_id };
        let touch = doc! { "$inc": { "ledger_seq": 1_i64 } };
        candidates
            .update_many_with_session(filter.clone(), touch, None, session)
            .await?;
        let cast = votes
            .count_documents_with_session(filter, None, session)
            .await?;
        if cast > 0 {
            return Err(Error::Status(
                Status::Conflict,
                "Campaign already has votes; its quota scope is fixed".to_string(),
            ));
        }
    }

    campaigns
        .replace_one_with_session(campaign_id.as_doc(), &campaign, None, session)
        .await?;
    Ok(campaign)
}

#[put("/campaigns/<campaign_id>/label", data = "<change>", format = "json")]
async fn set_label(
    _token: AuthToken<Admin>,
    campaign_id: Id,
    change: Json<LabelChange>,
    campaigns: Coll<Campaign>,
) -> Result<()> {
    let update = doc! {
        "$set": { "label": change.label },
    };
    let result = campaigns
        .update_one(campaign_id.as_doc(), update, None)
        .await?;
    if result.matched_count == 0 {
        return Err(Error::not_found("Campaign"));
    }
    Ok(())
}

#[delete("/campaigns/<campaign_id>")]
async fn delete_campaign(
    _token: AuthToken<Admin>,
    campaign_id: Id,
    campaigns: Coll<Campaign>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
    config: &State<Config>,
) -> Result<()> {
    // Atomically delete the campaign and everything that refers to it.
    let (colls, db_client) = ((&campaigns, &candidates, &votes), db_client.inner());
    let removed = retry_transient(
        "Campaign deletion",
        config.transaction_retry_window(),
        move || async move {
            let mut session = db_client.start_session(None).await?;
            session.start_transaction(None).await?;
            let result = delete_cascade(campaign_id, colls, &mut session).await;
            finish(&mut session, result).await
        },
    )
    .await?;

    info!("Deleted campaign {campaign_id} and {removed} vote(s)");
    Ok(())
}

/// Delete the campaign, its votes and its candidates, returning how many votes went.
async fn delete_cascade(
    campaign_id: Id,
    (campaigns, candidates, votes): (&Coll<Campaign>, &Coll<Candidate>, &Coll<Vote>),
    session: &mut ClientSession,
) -> Result<u64> {
    let result = campaigns
        .delete_one_with_session(campaign_id.as_doc(), None, session)
        .await?;
    if result.deleted_count == 0 {
        return Err(Error::not_found("Campaign"));
    }

    // Deleting the candidates conflicts with any vote being cast for them.
    let filter = doc! { "campaign_id": campaign_id };
    let removed_votes = votes
        .delete_many_with_session(filter.clone(), None, session)
        .await?;
    candidates
        .delete_many_with_session(filter, None, session)
        .await?;
    Ok(removed_votes.deleted_count)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use mongodb::Database;
    use rocket::{
        http::ContentType,
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };

    use crate::model::{
        common::{
            campaign::{CampaignLabel, QuotaScope},
            voter::Region,
            window::WindowState,
        },
        db::{
            campaign::{NewCampaign, DEFAULT_COLOR},
            candidate::CandidateCore,
            vote::VoteCore,
        },
    };

    use super::*;

    async fn create<'c>(client: &'c Client, spec: &CampaignSpec) -> LocalResponse<'c> {
        client
            .post(uri!(create_campaign))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await
    }

    #[backend_test(admin)]
    async fn create_applies_defaults(client: Client, campaigns: Coll<Campaign>) {
        let response = create(&client, &CampaignSpec::minimal_example()).await;
        assert_eq!(Status::Created, response.status());
        let summary: CampaignSummary = response.into_json().await.unwrap();
        assert_eq!(summary.window, WindowState::Inactive);
        assert_eq!(summary.seconds_remaining, None);

        let stored = campaigns
            .find_one(summary.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.color, DEFAULT_COLOR);
        assert_eq!(stored.votes_per_voter, 1);
        assert_eq!(stored.quota_scope, QuotaScope::PerCampaign);
        assert_eq!(stored.label, CampaignLabel::Scheduled);
    }

    #[backend_test(admin)]
    async fn create_rejects_invalid(client: Client, db: Database) {
        let now = Utc::now();
        let backwards = CampaignSpec {
            start: Some(now),
            end: Some(now - Duration::hours(1)),
            ..CampaignSpec::minimal_example()
        };
        let no_votes = CampaignSpec {
            votes_per_voter: Some(0),
            ..CampaignSpec::minimal_example()
        };
        let no_title = CampaignSpec {
            title: String::new(),
            ..CampaignSpec::minimal_example()
        };
        for spec in [backwards, no_votes, no_title] {
            assert_eq!(Status::BadRequest, create(&client, &spec).await.status());
        }
        let count = Coll::<Campaign>::from_db(&db)
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[backend_test(voter)]
    async fn voters_cannot_manage_campaigns(client: Client) {
        let response = create(&client, &CampaignSpec::minimal_example()).await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(admin)]
    async fn update_and_label(client: Client, campaigns: Coll<Campaign>) {
        let summary: CampaignSummary = create(&client, &CampaignSpec::current_example())
            .await
            .into_json()
            .await
            .unwrap();
        let id: Id = summary.id.into();

        // Partial update.
        let patch = CampaignPatch {
            votes_per_voter: Some(7),
            ..Default::default()
        };
        let response = client
            .patch(uri!(update_campaign(id)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&patch).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        // Invalid merged result.
        let patch = CampaignPatch {
            end: summary.start.map(|start| start - Duration::hours(1)),
            ..Default::default()
        };
        let response = client
            .patch(uri!(update_campaign(id)))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&patch).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let response = client
            .put(uri!(set_label(id)))
            .header(ContentType::JSON)
            .body(r#"{"label":"finished"}"#)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let stored = campaigns.find_one(id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.votes_per_voter, 7);
        // Stored datetimes have millisecond precision.
        assert_eq!(
            stored.end.map(|end| end.timestamp_millis()),
            summary.end.map(|end| end.timestamp_millis())
        );
        assert_eq!(stored.label, CampaignLabel::Finished);
        // The label never changes whether votes are accepted.
        assert_eq!(stored.window(Utc::now()), WindowState::InProgress);

        let response = client
            .put(uri!(set_label(Id::new())))
            .header(ContentType::JSON)
            .body(r#"{"label":"active"}"#)
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn list_orders_by_label_then_start(client: Client, campaigns: Coll<Campaign>) {
        let mut expected = vec![];
        for core in [
            NewCampaign::past_example(),
            NewCampaign::future_example(),
            NewCampaign::current_example(),
        ] {
            let campaign = Campaign {
                id: Id::new(),
                campaign: core,
            };
            campaigns.insert_one(&campaign, None).await.unwrap();
            expected.push(campaign.id);
        }
        // Active, scheduled, finished.
        expected.reverse();

        let response = client.get(uri!(list_campaigns)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let summaries: Vec<CampaignSummary> = response.into_json().await.unwrap();
        let ids: Vec<Id> = summaries.iter().map(|s| s.id.into()).collect();
        assert_eq!(ids, expected);
        assert_eq!(summaries[0].window, WindowState::InProgress);
        assert_eq!(summaries[1].window, WindowState::Scheduled);
        assert_eq!(summaries[2].window, WindowState::Finished);
        assert_eq!(summaries[2].seconds_remaining, Some(0));
    }

    #[backend_test]
    async fn missing_campaign(client: Client) {
        let id = Id::new();
        let response = client.get(uri!(get_campaign(id))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        let body: serde_json::Value = response.into_json().await.unwrap();
        assert_eq!(body["message"], "Campaign not found");
        assert!(!body.to_string().contains(&id.to_string()));
    }

    #[backend_test(admin)]
    async fn scope_is_fixed_once_voted(
        client: Client,
        campaigns: Coll<Campaign>,
        candidates: Coll<Candidate>,
        votes: Coll<Vote>,
    ) {
        let campaign = Campaign {
            id: Id::new(),
            campaign: NewCampaign::current_example(),
        };
        campaigns.insert_one(&campaign, None).await.unwrap();
        let candidate = Candidate {
            id: Id::new(),
            candidate: CandidateCore::example("Alvarez", 1, Id::new(), campaign.id),
        };
        candidates.insert_one(&candidate, None).await.unwrap();
        let vote = Vote {
            id: Id::new(),
            vote: VoteCore {
                voter_id: Id::new(),
                candidate_id: candidate.id,
                position_id: candidate.position_id,
                campaign_id: campaign.id,
                scope: campaign.scope_key(),
                region: Region {
                    department: 1,
                    municipality: 101,
                },
                cast_at: Utc::now(),
            },
        };
        votes.insert_one(&vote, None).await.unwrap();

        let to_global = serde_json::to_string(&CampaignPatch {
            quota_scope: Some(QuotaScope::Global),
            ..Default::default()
        })
        .unwrap();
        let response = client
            .patch(uri!(update_campaign(campaign.id)))
            .header(ContentType::JSON)
            .body(to_global.clone())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
        let stored = campaigns
            .find_one(campaign.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.quota_scope, QuotaScope::PerCampaign);

        // Without votes the scope can change, and the candidates are touched
        // so a vote cast at the same time would have conflicted.
        votes.delete_many(doc! {}, None).await.unwrap();
        let response = client
            .patch(uri!(update_campaign(campaign.id)))
            .header(ContentType::JSON)
            .body(to_global)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let stored = campaigns
            .find_one(campaign.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.quota_scope, QuotaScope::Global);
        let touched = candidates
            .find_one(candidate.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(touched.ledger_seq, 1);
    }

    #[backend_test(admin)]
    async fn delete_cascades(
        client: Client,
        campaigns: Coll<Campaign>,
        candidates: Coll<Candidate>,
        votes: Coll<Vote>,
    ) {
        let mut ids = vec![];
        for _ in 0..2 {
            let campaign = Campaign {
                id: Id::new(),
                campaign: NewCampaign::current_example(),
            };
            campaigns.insert_one(&campaign, None).await.unwrap();
            let candidate = Candidate {
                id: Id::new(),
                candidate: CandidateCore::example("Alvarez", 1, Id::new(), campaign.id),
            };
            candidates.insert_one(&candidate, None).await.unwrap();
            let vote = Vote {
                id: Id::new(),
                vote: VoteCore {
                    voter_id: Id::new(),
                    candidate_id: candidate.id,
                    position_id: candidate.position_id,
                    campaign_id: campaign.id,
                    scope: campaign.scope_key(),
                    region: Region {
                        department: 11,
                        municipality: 1,
                    },
                    cast_at: Utc::now(),
                },
            };
            votes.insert_one(&vote, None).await.unwrap();
            ids.push(campaign.id);
        }

        let response = client
            .delete(uri!(delete_campaign(ids[0])))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        for (count, expected) in [
            (campaigns.count_documents(None, None).await.unwrap(), 1),
            (candidates.count_documents(None, None).await.unwrap(), 1),
            (votes.count_documents(None, None).await.unwrap(), 1),
            (
                votes
                    .count_documents(doc! { "campaign_id": ids[1] }, None)
                    .await
                    .unwrap(),
                1,
            ),
        ] {
            assert_eq!(count, expected);
        }

        let response = client
            .delete(uri!(delete_campaign(ids[0])))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
