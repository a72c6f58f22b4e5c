use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use mongodb::{Client as MongoClient, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::ledger::VoteLedger;
use crate::model::{
    api::region::DepartmentSeed,
    common::window::{Clock, SystemClock},
    mongodb::{ensure_indexes_exist, seed_region_catalog, transaction::DEFAULT_RETRY_WINDOW},
};

fn default_global_quota() -> u32 {
    7
}

fn default_transaction_retry_secs() -> u64 {
    DEFAULT_RETRY_WINDOW.as_secs()
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    #[serde(default)]
    admin_registration_numbers: Vec<String>,
    /// Votes per member across every campaign with the global quota scope.
    #[serde(default = "default_global_quota")]
    global_quota: u32,
    #[serde(default = "default_transaction_retry_secs")]
    transaction_retry_secs: u64,
    #[serde(default)]
    regions: Vec<DepartmentSeed>,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Whether a member registering with this number becomes an administrator.
    pub fn is_admin_registration(&self, registration_number: &str) -> bool {
        self.admin_registration_numbers
            .iter()
            .any(|number| number == registration_number)
    }

    pub fn global_quota(&self) -> u32 {
        self.global_quota
    }

    /// How long a transaction that keeps hitting write conflicts is retried.
    pub fn transaction_retry_window(&self) -> StdDuration {
        StdDuration::from_secs(self.transaction_retry_secs)
    }

    /// Departments and municipalities to make sure exist at startup.
    pub fn regions(&self) -> &[DepartmentSeed] {
        &self.regions
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.global_quota == 0 {
            error!("`global_quota` must be at least 1");
            return Err(rocket);
        }
        if !config.admin_registration_numbers.is_empty() {
            info!(
                "{} registration number(s) reserved for administrators",
                config.admin_registration_numbers.len()
            );
        }

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
pub(crate) struct DbConfig {
    // secrets
    pub(crate) db_uri: String,
}

/// A fairing that connects to MongoDB, ensures the indexes exist, and places
/// the `Client`, the `Database` and the [`VoteLedger`] into managed state.
///
/// Must be attached after [`ConfigFairing`].
pub struct DatabaseFairing {
    /// An existing connection to reuse instead of connecting from config.
    client: Option<(MongoClient, String)>,
    clock: Arc<dyn Clock>,
}

impl DatabaseFairing {
    /// Connect using `db_uri` from the config.
    pub fn from_config() -> Self {
        Self {
            client: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use an existing client and the named database.
    pub fn with_client(client: MongoClient, db_name: &str) -> Self {
        Self {
            client: Some((client, db_name.to_string())),
            clock: Arc::new(SystemClock),
        }
    }

    /// Evaluate campaign windows against `clock` instead of the system time.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }
}

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let (client, db_name) = match &self.client {
            Some((client, db_name)) => (client.clone(), db_name.clone()),
            None => {
                let config = match rocket.figment().extract::<DbConfig>() {
                    Ok(config) => config,
                    Err(e) => {
                        error!("Failed to load database config");
                        rocket::config::pretty_print_error(e);
                        return Err(rocket);
                    }
                };
                info!("Loaded database config, connecting...");
                match MongoClient::with_uri_str(config.db_uri).await {
                    Ok(client) => (client, DATABASE.to_string()),
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
        };
        let db: Database = client.database(&db_name);

        let Some(config) = rocket.state::<Config>() else {
            error!("Database fairing attached before the config fairing");
            return Err(rocket);
        };
        let regions = config.regions().to_vec();
        let (global_quota, retry_window) =
            (config.global_quota(), config.transaction_retry_window());

        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        if let Err(e) = seed_region_catalog(&db, &regions).await {
            error!("Failed to seed the region catalog: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        let ledger = VoteLedger::new(
            client.clone(),
            db.clone(),
            self.clock.clone(),
            global_quota,
            retry_window,
        );

        rocket = rocket.manage(client).manage(db).manage(ledger);
        Ok(rocket)
    }
}

/// Name of the production database.
pub const DATABASE: &str = "board_elections";


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_registration_numbers() {
        let config = Config::example();
        assert!(config.is_admin_registration("ADM-00001"));
        assert!(!config.is_admin_registration("CIV-10001"));
        assert!(!config.is_admin_registration(""));
    }

    #[test]
    fn defaults_from_figment() {
        let figment = rocket::figment::Figment::from(rocket::Config::default())
            .merge(("auth_ttl", 60))
            .merge(("jwt_secret", "secret"));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.global_quota(), 7);
        assert_eq!(config.transaction_retry_window(), StdDuration::from_secs(120));
        assert!(config.admin_registration_numbers.is_empty());
        assert!(config.regions().is_empty());
        assert_eq!(config.auth_ttl(), Duration::seconds(60));
    }

    #[test]
    fn regions_from_figment() {
        let figment = rocket::figment::Figment::from(rocket::Config::default())
            .merge(("auth_ttl", 60))
            .merge(("jwt_secret", "secret"))
            .merge(("global_quota", 3))
            .merge(("regions", DepartmentSeed::examples()));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.global_quota(), 3);
        assert_eq!(config.regions(), DepartmentSeed::examples().as_slice());
    }
}
