use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

use super::voter::VoterCore;

/// A voter holding the administrator role.
///
/// Administrators live in the voters collection; this type only exists so
/// request guards and routes can demand the stronger rights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Admin {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}
