//! Types shared between the database and API representations.

pub mod campaign;
pub mod voter;
pub mod window;
