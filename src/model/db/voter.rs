use std::ops::{Deref, DerefMut};

use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::voter::{Region, Role},
    mongodb::Id,
};

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// Full name.
    pub name: String,
    /// Association registration number. Unique.
    pub registration_number: String,
    /// National identity document number. Unique.
    pub national_id: String,
    /// Contact email. Unique.
    pub email: String,
    pub date_of_birth: NaiveDate,
    /// Argon2 encoded password hash.
    pub password_hash: String,
    pub region: Region,
    pub specialty: Option<String>,
    pub role: Role,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
    /// Set once by the vote ledger when a quota is first used up. Never cleared.
    pub has_fully_voted: bool,
    /// Scope keys of the ballots this voter has used up.
    #[serde(default)]
    pub completed_scopes: Vec<String>,
    /// Bumped inside every vote transaction so that concurrent transactions
    /// for the same voter conflict with each other.
    #[serde(default)]
    pub ledger_seq: i64,
}

impl VoterCore {
    /// Check whether the given password is correct.
    /// A malformed stored hash never verifies.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::api::auth::Registration;

    impl VoterCore {
        pub fn example() -> Self {
            Registration::example()
                .into_voter(Role::Standard, Utc::now())
                .unwrap()
        }

        pub fn example2() -> Self {
            Registration::example2()
                .into_voter(Role::Standard, Utc::now())
                .unwrap()
        }
    }
}
