use mongodb::Database;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    ledger::tally::tally,
    model::{api::results::PositionResults, mongodb::Id},
};

pub fn routes() -> Vec<Route> {
    routes![results]
}

/// Vote counts per position, for one campaign or across all of them.
#[get("/results?<campaign>")]
async fn results(
    campaign: Option<Id>,
    db: &State<Database>,
) -> Result<Json<Vec<PositionResults>>> {
    Ok(Json(tally(db, campaign).await?))
}
