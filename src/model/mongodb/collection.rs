use std::ops::Deref;

use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{IndexOptions, ReplaceOptions},
    Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::{
    api::region::DepartmentSeed,
    db::{
        admin::Admin,
        campaign::Campaign,
        candidate::Candidate,
        position::Position,
        region::{Department, Municipality},
        vote::Vote,
        voter::Voter,
    },
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Voter collections. Administrators are voters with the administrator role.
pub const VOTERS: &str = "voters";
impl MongoCollection for Voter {
    const NAME: &'static str = VOTERS;
}
impl MongoCollection for Admin {
    const NAME: &'static str = VOTERS;
}

// Campaign collection
pub const CAMPAIGNS: &str = "campaigns";
impl MongoCollection for Campaign {
    const NAME: &'static str = CAMPAIGNS;
}

// Position collection
pub const POSITIONS: &str = "positions";
impl MongoCollection for Position {
    const NAME: &'static str = POSITIONS;
}

// Candidate collection
pub const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}

// Vote collection. Votes are inserted with a client-generated ID.
pub const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}

// Region catalog collections
pub const DEPARTMENTS: &str = "departments";
impl MongoCollection for Department {
    const NAME: &'static str = DEPARTMENTS;
}
pub const MUNICIPALITIES: &str = "municipalities";
impl MongoCollection for Municipality {
    const NAME: &'static str = MUNICIPALITIES;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Voter collection: each identifying field is unique on its own.
    let voters = Coll::<Voter>::from_db(db);
    for field in ["registration_number", "national_id", "email"] {
        let index = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(unique.clone())
            .build();
        voters.create_index(index, None).await?;
    }

    // Vote collection: one vote per voter per position within a scope.
    let votes = Coll::<Vote>::from_db(db);
    let ballot_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "position_id": 1, "scope": 1})
        .options(unique.clone())
        .build();
    votes.create_index(ballot_index, None).await?;
    for field in ["campaign_id", "candidate_id"] {
        let index = IndexModel::builder().keys(doc! { field: 1 }).build();
        votes.create_index(index, None).await?;
    }

    // Candidate collection.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"campaign_id": 1, "position_id": 1, "order": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Municipality collection: listed by department.
    let department_index = IndexModel::builder().keys(doc! {"department": 1}).build();
    Coll::<Municipality>::from_db(db)
        .create_index(department_index, None)
        .await?;

    Ok(())
}

/// Upsert the configured departments and municipalities.
///
/// Entries already stored but missing from `seeds` are left alone.
pub async fn seed_region_catalog(db: &Database, seeds: &[DepartmentSeed]) -> Result<(), DbError> {
    let departments = Coll::<Department>::from_db(db);
    let municipalities = Coll::<Municipality>::from_db(db);
    let upsert = ReplaceOptions::builder().upsert(true).build();

    let mut seeded = 0;
    for seed in seeds {
        let (department, children) = seed.clone().into_documents();
        let filter = doc! { "_id": i64::from(department.code) };
        departments
            .replace_one(filter, &department, upsert.clone())
            .await?;
        for municipality in &children {
            let filter = doc! { "_id": i64::from(municipality.code) };
            municipalities
                .replace_one(filter, municipality, upsert.clone())
                .await?;
        }
        seeded += children.len();
    }
    debug!("Seeded {} department(s), {seeded} municipalities", seeds.len());
    Ok(())
}
