use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::{
    common::voter::Role,
    db::{admin::Admin, voter::Voter},
    mongodb::Id,
};

/// A user of our application, having defined rights.
pub trait User {
    /// The rights needed to act as this user type.
    const RIGHTS: Rights;
    /// Get the user's ID.
    fn id(&self) -> Id;
    /// The rights this particular user holds.
    fn rights(&self) -> Rights;
}

/// Different privilege levels. Higher levels include the lower ones.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl From<Role> for Rights {
    fn from(role: Role) -> Self {
        match role {
            Role::Standard => Self::Voter,
            Role::Administrator => Self::Admin,
        }
    }
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::Voter => "voter",
            Self::Admin => "admin",
        })
    }
}

impl User for Voter {
    const RIGHTS: Rights = Rights::Voter;

    fn id(&self) -> Id {
        self.id
    }

    fn rights(&self) -> Rights {
        self.role.into()
    }
}

impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;

    fn id(&self) -> Id {
        self.id
    }

    fn rights(&self) -> Rights {
        self.role.into()
    }
}
