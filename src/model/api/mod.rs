//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.

pub mod auth;
pub mod campaign;
pub mod candidate;
pub mod id;
pub mod position;
pub mod region;
pub mod results;
pub mod vote;
pub mod voter;
