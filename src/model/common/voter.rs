use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// A member's role in the association's election system.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Standard,
    Administrator,
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}

/// Where a member is registered. Copied onto each vote at the moment it is
/// cast, so reports reflect the region at time of voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub department: u32,
    pub municipality: u32,
}
