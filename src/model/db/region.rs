use serde::{Deserialize, Serialize};

/// A department of the country, keyed by its official numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    #[serde(rename = "_id")]
    pub code: u32,
    pub name: String,
}

/// A municipality, keyed by its official code and belonging to one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Municipality {
    #[serde(rename = "_id")]
    pub code: u32,
    pub department: u32,
    pub name: String,
}
