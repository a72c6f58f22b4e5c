use rocket::Route;

mod admin;
pub mod auth;
mod campaigns;
mod candidates;
mod positions;
mod regions;
mod results;
mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(campaigns::routes());
    routes.extend(positions::routes());
    routes.extend(regions::routes());
    routes.extend(candidates::routes());
    routes.extend(votes::routes());
    routes.extend(results::routes());
    routes.extend(admin::routes());
    routes
}
