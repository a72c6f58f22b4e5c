//! Data types, split by where they are used.
//!
//! - `api`: request and response bodies.
//! - `common`: types shared by both representations.
//! - `db`: documents as stored in MongoDB.
//! - `mongodb`: collection handles, IDs and driver helpers.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
