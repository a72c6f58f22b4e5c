use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// An ID that serializes to a plain hex string rather than MongoDB's
/// extended-JSON `{"$oid": ...}` form. Used in API *responses*; requests
/// can deserialize straight into [`Id`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ApiId(Id);

impl Debug for ApiId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiId({})", self.0)
    }
}

impl Display for ApiId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl TryFrom<String> for ApiId {
    type Error = mongodb::bson::oid::Error;

    fn try_from(hex: String) -> Result<Self, Self::Error> {
        hex.parse::<Id>().map(Self)
    }
}

impl From<ApiId> for String {
    fn from(id: ApiId) -> Self {
        id.to_string()
    }
}

impl From<Id> for ApiId {
    fn from(id: Id) -> Self {
        Self(id)
    }
}

impl From<ApiId> for Id {
    fn from(id: ApiId) -> Self {
        id.0
    }
}

impl Deref for ApiId {
    type Target = Id;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
