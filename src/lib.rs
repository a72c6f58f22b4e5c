#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

/// Build the server from `Rocket.toml` and the environment.
///
/// Nothing connects until the rocket is ignited; configuration or database
/// failures surface as ignition errors.
pub async fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing::from_config())
        .mount("/", api::routes())
}

/// Connect to the database named in the config, for tests.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let config = rocket::Config::figment()
        .extract::<config::DbConfig>()
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(config.db_uri)
        .await
        .expect("could not reach the test database")
}

/// A fresh database name, so tests never share state.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// A server using the given database, with a known administrator registration
/// number, a global quota of 2 and the example region catalog.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    rocket_for_db_at(client, db_name, std::sync::Arc::new(model::common::window::SystemClock))
        .await
}

/// Like [`rocket_for_db`], but telling the time with `clock`.
#[cfg(test)]
pub(crate) async fn rocket_for_db_at(
    client: mongodb::Client,
    db_name: &str,
    clock: std::sync::Arc<dyn model::common::window::Clock>,
) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("admin_registration_numbers", ["ADM-00001"]))
        .merge(("global_quota", 2))
        .merge(("regions", model::api::region::DepartmentSeed::examples()))
        .merge(("log_level", "off"));
    rocket::custom(figment)
        .attach(ConfigFairing)
        .attach(DatabaseFairing::with_client(client, db_name).with_clock(clock))
        .mount("/", api::routes())
}
