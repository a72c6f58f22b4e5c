use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::position::{NewPosition, Position},
};

/// A new position, as submitted by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order: u32,
}

impl From<PositionSpec> for NewPosition {
    fn from(spec: PositionSpec) -> Self {
        Self {
            name: spec.name.trim().to_string(),
            description: spec.description,
            order: spec.order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDescription {
    pub id: ApiId,
    pub name: String,
    pub description: Option<String>,
    pub order: u32,
}

impl From<Position> for PositionDescription {
    fn from(position: Position) -> Self {
        Self {
            id: position.id.into(),
            name: position.position.name,
            description: position.position.description,
            order: position.position.order,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl PositionSpec {
        pub fn example(name: &str, order: u32) -> Self {
            Self {
                name: name.to_string(),
                description: None,
                order,
            }
        }
    }
}
