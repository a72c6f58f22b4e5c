use mongodb::{bson::doc, options::FindOptions, Client, ClientSession};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            candidate::{CandidateDescription, CandidatePatch, CandidateSpec},
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
        list_candidates,
        create_candidate,
        update_candidate,
        delete_candidate,
    ]
}

fn check_names(candidate: &Candidate) -> Result<()> {
    if candidate.name.is_empty() || candidate.registration_number.is_empty() {
        return Err(Error::bad_request(
            "Candidate name and registration number must not be empty",
        ));
    }
    Ok(())
}

async fn ensure_position_exists(positions: &Coll<Position>, position_id: Id) -> Result<()> {
    positions
        .find_one(position_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Position"))?;
    Ok(())
}

#[get("/campaigns/<campaign_id>/candidates")]
async fn list_candidates(
    campaign_id: Id,
    campaigns: Coll<Campaign>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    campaigns
        .find_one(campaign_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Campaign"))?;
    let sort = FindOptions::builder()
        .sort(doc! { "order": 1, "name": 1 })
        .build();
    let running = candidates
        .find(doc! { "campaign_id": campaign_id }, sort)
        .await?
        .map_ok(CandidateDescription::from)
        .try_collect()
        .await?;
    Ok(Json(running))
}

#[post("/campaigns/<campaign_id>/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    _token: AuthToken<Admin>,
    campaign_id: Id,
    spec: Json<CandidateSpec>,
    campaigns: Coll<Campaign>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<(Status, Json<CandidateDescription>)> {
    campaigns
        .find_one(campaign_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Campaign"))?;
    ensure_position_exists(&positions, spec.position_id).await?;

    let candidate = Candidate {
        id: Id::new(),
        candidate: spec.0.into_candidate(campaign_id),
    };
    check_names(&candidate)?;
    candidates.insert_one(&candidate, None).await?;
    Ok((Status::Created, Json(candidate.into())))
}

#[patch("/candidates/<candidate_id>", data = "<patch>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn update_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    patch: Json<CandidatePatch>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
    config: &State<Config>,
) -> Result<Json<CandidateDescription>> {
    if let Some(position_id) = patch.position_id {
        ensure_position_exists(&positions, position_id).await?;
    }

    let patch = patch.into_inner();
    let (colls, db_client) = ((&candidates, &votes), db_client.inner());
    let candidate = retry_transient(
        "Candidate update",
        config.transaction_retry_window(),
        move || {
            let patch = patch.clone();
            async move {
                let mut session = db_client.start_session(None).await?;
                session.start_transaction(None).await?;
                let result = apply_patch(candidate_id, patch, colls, &mut session).await;
                finish(&mut session, result).await
            }
        },
    )
    .await?;
    Ok(Json(candidate.into()))
}

/// Patch and store a candidate inside `session`'s transaction.
///
/// Votes record the position they were cast for, so a candidate who already
/// has votes cannot move to another position.
async fn apply_patch(
    candidate_id: Id,
    patch: CandidatePatch,
    (candidates, votes): (&Coll<Candidate>, &Coll<Vote>),
    session: &mut ClientSession,
) -> Result<Candidate> {
    let mut candidate = candidates
        .find_one_with_session(candidate_id.as_doc(), None, session)
        .await?
        .ok_or_else(|| Error::not_found("Candidate"))?;
    let old_position = candidate.position_id;

    patch.apply_to(&mut candidate.candidate);
    check_names(&candidate)?;

    if candidate.position_id != old_position {
        let cast = votes
            .count_documents_with_session(doc! { "candidate_id": candidate_id }, None, session)
            .await?;
        if cast > 0 {
            return Err(Error::Status(
                Status::Conflict,
                "Candidate already has votes; their position is fixed".to_string(),
            ));
        }
    }

    // Replacing the document conflicts with any vote being cast for them.
    candidate.ledger_seq += 1;
    candidates
        .replace_one_with_session(candidate_id.as_doc(), &candidate, None, session)
        .await?;
    Ok(candidate)
}

#[delete("/candidates/<candidate_id>")]
pub async fn delete_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    db_client: &State<Client>,
    config: &State<Config>,
) -> Result<()> {
    // Atomically delete the candidate and the votes cast for them.
    let (colls, db_client) = ((&candidates, &votes), db_client.inner());
    let removed = retry_transient(
        "Candidate deletion",
        config.transaction_retry_window(),
        move || async move {
            let mut session = db_client.start_session(None).await?;
            session.start_transaction(None).await?;
            let result = delete_with_votes(candidate_id, colls, &mut session).await;
            finish(&mut session, result).await
        },
    )
    .await?;

    info!("Deleted candidate {candidate_id} and {removed} vote(s)");
    Ok(())
}

async fn delete_with_votes(
    candidate_id: Id,
    (candidates, votes): (&Coll<Candidate>, &Coll<Vote>),
    session: &mut ClientSession,
) -> Result<u64> {
    let result = candidates
        .delete_one_with_session(candidate_id.as_doc(), None, session)
        .await?;
    if result.deleted_count == 0 {
        return Err(Error::not_found("Candidate"));
    }
    let removed = votes
        .delete_many_with_session(doc! { "candidate_id": candidate_id }, None, session)
        .await?;
    Ok(removed.deleted_count)
}
