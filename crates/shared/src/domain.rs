use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(EstablishmentId);

/// City identifier as the backend knows it, usually the city name. Numeric
/// ids coming back from geocoding are kept in their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CityId(pub String);

impl<'de> Deserialize<'de> for CityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCityId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawCityId::deserialize(deserializer)? {
            RawCityId::Text(text) => CityId(text),
            RawCityId::Number(number) => CityId(number.to_string()),
        })
    }
}

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Customer,
    Establishment,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Establishment => "establishment",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user type '{0}': expected 'customer' or 'establishment'")]
pub struct InvalidUserType(pub String);

impl FromStr for UserType {
    type Err = InvalidUserType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "customer" => Ok(Self::Customer),
            "establishment" => Ok(Self::Establishment),
            other => Err(InvalidUserType(other.to_string())),
        }
    }
}

/// Identity record held by the auth state and mirrored in session storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u_type: Option<UserType>,
    #[serde(
        default,
        deserialize_with = "lenient_coordinate",
        skip_serializing_if = "Option::is_none"
    )]
    pub lat: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_coordinate",
        skip_serializing_if = "Option::is_none"
    )]
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<CityId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Login echoes the multipart form back, so coordinates may arrive as text.
fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCoordinate {
        Number(f64),
        Text(String),
    }

    match Option::<RawCoordinate>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawCoordinate::Number(value)) => Ok(Some(value)),
        Some(RawCoordinate::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Establishment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eid: Option<EstablishmentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<UserId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Editable fields of an establishment, used for creation and as the
/// `changes` payload of an update. Unset fields are left out of the body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EstablishmentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl EstablishmentDetails {
    /// Establishment record built from the submitted fields alone, used when
    /// the backend answers a creation without echoing the record back.
    pub fn to_establishment(&self, uid: UserId) -> Establishment {
        Establishment {
            eid: None,
            uid: Some(uid),
            name: self.name.clone().unwrap_or_default(),
            address: self.address.clone().unwrap_or_default(),
            lat: self.lat,
            lon: self.lon,
            attributes: self.attributes.clone(),
        }
    }
}

/// Radius marker drawn around a search location on the map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Circle {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    #[serde(default)]
    pub radius: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eid: Option<EstablishmentId>,
    #[serde(default)]
    pub created_at: f64,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Order as submitted by a customer. The location fields drive the
/// establishment refresh that follows a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub uid: UserId,
    pub eid: EstablishmentId,
    pub cid: CityId,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub items: Vec<Value>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBucket {
    pub index: u64,
    pub orders: Vec<Order>,
    pub total: f64,
}
