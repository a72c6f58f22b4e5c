use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            candidate::CandidateDescription,
            position::{PositionDescription, PositionSpec},
        },
        db::{admin::Admin, candidate::Candidate, position::Position},
        mongodb::{Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![list_positions, create_position, position_candidates]
}

#[get("/positions")]
async fn list_positions(positions: Coll<Position>) -> Result<Json<Vec<PositionDescription>>> {
    let sort = FindOptions::builder()
        .sort(doc! { "order": 1, "name": 1 })
        .build();
    let all = positions
        .find(None, sort)
        .await?
        .map_ok(PositionDescription::from)
        .try_collect()
        .await?;
    Ok(Json(all))
}

#[post("/positions", data = "<spec>", format = "json")]
async fn create_position(
    _token: AuthToken<Admin>,
    spec: Json<PositionSpec>,
    positions: Coll<Position>,
) -> Result<(Status, Json<PositionDescription>)> {
    let position = Position {
        id: Id::new(),
        position: spec.0.into(),
    };
    if position.name.is_empty() {
        return Err(Error::bad_request("Position name must not be empty"));
    }
    positions.insert_one(&position, None).await?;
    Ok((Status::Created, Json(position.into())))
}

/// Every candidate running for a position, across campaigns.
#[get("/positions/<position_id>/candidates")]
async fn position_candidates(
    position_id: Id,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    positions
        .find_one(position_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Position"))?;
    let sort = FindOptions::builder()
        .sort(doc! { "order": 1, "name": 1 })
        .build();
    let running = candidates
        .find(doc! { "position_id": position_id }, sort)
        .await?
        .map_ok(CandidateDescription::from)
        .try_collect()
        .await?;
    Ok(Json(running))
}
