use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::domain::{
    CityId, Circle, Establishment, EstablishmentDetails, EstablishmentId, NewOrder, Order,
    OrderBucket, UserId, UserType,
};

pub fn login_route() -> &'static str {
    "/login"
}

pub fn update_user_route() -> &'static str {
    "/update-user"
}

pub fn update_user_by_address_route() -> &'static str {
    "/update-user-by-address"
}

pub fn update_establishment_route() -> &'static str {
    "/update-est"
}

pub fn get_establishment_route() -> &'static str {
    "/get-est"
}

pub fn create_establishment_route() -> &'static str {
    "/create-est"
}

pub fn establishments_by_city_route() -> &'static str {
    "/get-est-by-city"
}

pub fn submit_order_route() -> &'static str {
    "/submit-order"
}

pub fn establishment_orders_route() -> &'static str {
    "/get-estab-orders"
}

/// Text fields of the multipart `/login` form.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginForm {
    pub name: String,
    pub email: String,
    pub lat: f64,
    pub lon: f64,
}

impl LoginForm {
    pub fn fields(&self) -> [(&'static str, String); 4] {
        [
            ("name", self.name.clone()),
            ("email", self.email.clone()),
            ("lat", self.lat.to_string()),
            ("lon", self.lon.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserChanges {
    pub u_type: UserType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub changes: UserChanges,
    pub uid: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserByAddressRequest {
    pub address: String,
    pub uid: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedAddress {
    pub lat: f64,
    pub lon: f64,
    pub cid: CityId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEstablishmentRequest {
    pub changes: EstablishmentDetails,
    pub eid: EstablishmentId,
    pub uid: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEstablishmentRequest {
    pub uid: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEstablishmentRequest {
    pub uid: UserId,
    pub establishment: EstablishmentDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstablishmentsByCityRequest {
    pub city_id: CityId,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearbyEstablishments {
    #[serde(default)]
    pub establishments: Vec<Establishment>,
    #[serde(default)]
    pub circles: Vec<Circle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    pub order: NewOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstablishmentOrdersRequest {
    pub eid: EstablishmentId,
}

const FIRST_TS_KEY: &str = "first_ts";
const LAST_TS_KEY: &str = "last_ts";
const OVERALL_TOTAL_KEY: &str = "overall_total";

/// Orders of one establishment, decoded from the backend's mapping of
/// numeric bucket keys with `first_ts`, `last_ts` and `overall_total`
/// mixed into the same object.
///
/// Buckets are ordered by index. Keys that are neither numeric nor one of
/// the three aggregates are dropped.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OrderCollection {
    pub buckets: Vec<OrderBucket>,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
    pub overall_total: Option<f64>,
}

#[derive(Deserialize)]
struct WireBucket {
    #[serde(default)]
    orders: Vec<Order>,
    #[serde(default)]
    total: f64,
}

impl<'de> Deserialize<'de> for OrderCollection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut collection = OrderCollection::default();

        for (key, value) in raw {
            match key.as_str() {
                FIRST_TS_KEY => {
                    collection.first_timestamp = aggregate(&key, value).map_err(D::Error::custom)?
                }
                LAST_TS_KEY => {
                    collection.last_timestamp = aggregate(&key, value).map_err(D::Error::custom)?
                }
                OVERALL_TOTAL_KEY => {
                    collection.overall_total = aggregate(&key, value).map_err(D::Error::custom)?
                }
                _ => {
                    let Ok(index) = key.parse::<u64>() else {
                        continue;
                    };
                    let bucket: WireBucket = serde_json::from_value(value).map_err(|e| {
                        D::Error::custom(format!("invalid order bucket '{key}': {e}"))
                    })?;
                    collection.buckets.push(OrderBucket {
                        index,
                        orders: bucket.orders,
                        total: bucket.total,
                    });
                }
            }
        }

        collection.buckets.sort_by_key(|bucket| bucket.index);
        Ok(collection)
    }
}

fn aggregate(key: &str, value: Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => Ok(number.as_f64()),
        other => Err(format!("expected a number for '{key}', got {other}")),
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
