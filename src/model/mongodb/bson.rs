use std::fmt::{Display, Formatter};
use std::{ops::Deref, str::FromStr};

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use rocket::{
    data::ToByteUnit,
    form::{self, prelude::ErrorKind, DataField, FromFormField, ValueField},
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, Query, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// A database ID: a thin wrapper around a MongoDB `ObjectId`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(ObjectId);

impl Id {
    /// Generate a fresh unique ID.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// A filter document matching this ID.
    pub fn as_doc(&self) -> Document {
        doc! { "_id": self.0 }
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for Id {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for Id {
    type Err = mongodb::bson::oid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse::<ObjectId>()?))
    }
}

impl From<ObjectId> for Id {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl From<Id> for Bson {
    fn from(id: Id) -> Self {
        Bson::ObjectId(id.0)
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = mongodb::bson::oid::Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<Id>()
    }
}

#[rocket::async_trait]
impl<'r> FromFormField<'r> for Id {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        field.value.parse::<ObjectId>().map(Id).map_err(|err| {
            let error = ErrorKind::Custom(Box::new(err));
            error.into()
        })
    }

    async fn from_data(field: DataField<'r, '_>) -> form::Result<'r, Self> {
        field
            .data
            .open(24.bytes())
            .into_string()
            .await?
            .into_inner()
            .parse::<ObjectId>()
            .map(Id)
            .map_err(|err| {
                let error = ErrorKind::Custom(Box::new(err));
                error.into()
            })
    }
}

impl UriDisplay<Path> for Id {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl UriDisplay<Query> for Id {
    fn fmt(
        &self,
        formatter: &mut rocket::http::uri::fmt::Formatter<'_, Query>,
    ) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] Id);
impl_from_uri_param_identity!([Query] Id);

/// Serde helpers for optional chrono datetimes stored as native BSON datetimes.
///
/// `chrono_datetime_as_bson_datetime` only handles the non-optional case.
pub mod optional_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson::DateTime as BsonDateTime;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(datetime) => BsonDateTime::from_chrono(*datetime).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<BsonDateTime>::deserialize(deserializer)?;
        Ok(value.map(|datetime| datetime.to_chrono()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trips_through_its_hex_form() {
        let id = Id::new();
        let parsed: Id = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn id_filter_targets_the_primary_key() {
        let id = Id::new();
        assert_eq!(id.as_doc().get_object_id("_id").unwrap(), *id);
    }

    #[test]
    fn malformed_id_is_rejected() {
        assert!("not-an-object-id".parse::<Id>().is_err());
    }
}
