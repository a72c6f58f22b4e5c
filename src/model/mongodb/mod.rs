mod bson;
mod collection;
pub mod errors;
pub mod transaction;

pub use bson::{optional_bson_datetime, Id};
pub use collection::{
    ensure_indexes_exist, seed_region_catalog, Coll, MongoCollection, CAMPAIGNS, CANDIDATES,
    DEPARTMENTS, MUNICIPALITIES, POSITIONS, VOTERS, VOTES,
};
