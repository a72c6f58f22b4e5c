use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::Result,
    ledger::{Ballot, VoteLedger},
    model::{
        api::{
            auth::AuthToken,
            vote::{BallotStatus, Eligibility, VoteDescription, VoteRecord, VoteRequest},
        },
        db::{vote::Vote, voter::Voter},
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![ballot_status, eligibility, cast_vote, my_votes]
}

#[get("/campaigns/<campaign_id>/ballot")]
async fn ballot_status(
    token: AuthToken<Voter>,
    campaign_id: Id,
    ledger: &State<VoteLedger>,
) -> Result<Json<BallotStatus>> {
    Ok(Json(ledger.ballot_status(token.id, campaign_id).await?))
}

#[get("/campaigns/<campaign_id>/positions/<position_id>/eligibility")]
async fn eligibility(
    token: AuthToken<Voter>,
    campaign_id: Id,
    position_id: Id,
    ledger: &State<VoteLedger>,
) -> Result<Json<Eligibility>> {
    let eligibility = ledger
        .check_eligibility(token.id, campaign_id, position_id)
        .await?;
    Ok(Json(eligibility))
}

#[post("/campaigns/<campaign_id>/votes", data = "<request>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    campaign_id: Id,
    request: Json<VoteRequest>,
    ledger: &State<VoteLedger>,
) -> Result<(Status, Json<VoteRecord>)> {
    let ballot = Ballot {
        voter_id: token.id,
        campaign_id,
        position_id: request.position_id,
        candidate_id: request.candidate_id,
    };
    let record = ledger.cast_vote(ballot).await?;
    Ok((Status::Created, Json(record)))
}

/// The caller's own votes, oldest first.
#[get("/votes/mine?<campaign>")]
async fn my_votes(
    token: AuthToken<Voter>,
    campaign: Option<Id>,
    votes: Coll<Vote>,
) -> Result<Json<Vec<VoteDescription>>> {
    let mut filter = doc! { "voter_id": token.id };
    if let Some(campaign_id) = campaign {
        filter.insert("campaign_id", campaign_id);
    }
    let sort = FindOptions::builder().sort(doc! { "cast_at": 1 }).build();
    let cast = votes
        .find(filter, sort)
        .await?
        .map_ok(VoteDescription::from)
        .try_collect()
        .await?;
    Ok(Json(cast))
}
