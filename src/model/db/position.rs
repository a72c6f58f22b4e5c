use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A board seat that candidates run for. Positions are shared by all campaigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionCore {
    pub name: String,
    pub description: Option<String>,
    /// Display order, ascending.
    pub order: u32,
}

pub type NewPosition = PositionCore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub position: PositionCore,
}

impl Deref for Position {
    type Target = PositionCore;

    fn deref(&self) -> &Self::Target {
        &self.position
    }
}
