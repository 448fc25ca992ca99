use serde_json::Value;
use shared::{
    domain::{
        CityId, Circle, Establishment, EstablishmentDetails, EstablishmentId, NewOrder,
        OrderBucket, UserId,
    },
    protocol::{
        create_establishment_route, establishment_orders_route, establishments_by_city_route,
        get_establishment_route, submit_order_route, update_establishment_route,
        CreateEstablishmentRequest, EstablishmentOrdersRequest, EstablishmentsByCityRequest,
        GetEstablishmentRequest, NearbyEstablishments, OrderCollection, SubmitOrderRequest,
        UpdateEstablishmentRequest,
    },
};
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    api::ApiClient,
    error::ClientError,
    orders::{order_stats, orders_between, OrderStats},
    services::Services,
};

#[derive(Debug, Clone, Default)]
pub struct EstablishmentState {
    pub establishment: Option<Establishment>,
    pub all_establishments: Vec<Establishment>,
    pub circles: Vec<Circle>,
    pub orders: OrderCollection,
    pub first_ts: Option<f64>,
    pub last_ts: Option<f64>,
    pub filtered_orders: Vec<OrderBucket>,
    pub amt_orders: usize,
    pub amt_customers: usize,
    pub loading: bool,
    pub loading_msg: String,
    pub loading_orders: bool,
}

/// Establishment records, nearby listings and the order dashboard.
///
/// Each operation is a request, a wholesale replacement of the affected
/// fields and, for writes, a success notification. Overlapping calls are not
/// serialized: whichever response lands last is what the state shows.
pub struct EstablishmentStore {
    api: ApiClient,
    services: Services,
    order_window_tolerance: f64,
    state: RwLock<EstablishmentState>,
}

impl EstablishmentStore {
    pub fn new(api: ApiClient, services: Services, order_window_tolerance: f64) -> Self {
        Self {
            api,
            services,
            order_window_tolerance,
            state: RwLock::new(EstablishmentState::default()),
        }
    }

    pub async fn snapshot(&self) -> EstablishmentState {
        self.state.read().await.clone()
    }

    pub async fn establishment(&self) -> Option<Establishment> {
        self.state.read().await.establishment.clone()
    }

    pub async fn all_establishments(&self) -> Vec<Establishment> {
        self.state.read().await.all_establishments.clone()
    }

    pub async fn get_establishment_by_uid(&self, uid: UserId) -> Result<Establishment, ClientError> {
        self.begin("Getting establishment details...", false).await;
        let result = self
            .api
            .post_json(get_establishment_route(), &GetEstablishmentRequest { uid })
            .await;
        self.settle(
            "get_establishment_by_uid",
            result,
            false,
            |state, establishment: &Establishment| {
                state.establishment = Some(establishment.clone());
            },
        )
        .await
    }

    /// Creates the establishment owned by `uid`. When the backend does not
    /// send the stored record back, the submitted details become the local
    /// record.
    pub async fn create_establishment(
        &self,
        uid: UserId,
        details: EstablishmentDetails,
    ) -> Result<Establishment, ClientError> {
        self.begin("Creating establishment...", false).await;
        let result = self
            .api
            .post_json_lenient(
                create_establishment_route(),
                &CreateEstablishmentRequest {
                    uid,
                    establishment: details.clone(),
                },
            )
            .await
            .map(|body| created_or_echoed(body, &details, uid));
        let establishment = self
            .settle(
                "create_establishment",
                result,
                false,
                |state, establishment: &Establishment| {
                    state.establishment = Some(establishment.clone());
                },
            )
            .await?;

        info!(%uid, eid = ?establishment.eid, "created establishment");
        self.services.notify_success("Establishment created.");
        Ok(establishment)
    }

    /// Sends `changes` for the currently loaded establishment.
    pub async fn update_establishment(
        &self,
        uid: UserId,
        changes: EstablishmentDetails,
    ) -> Result<Establishment, ClientError> {
        let eid = self
            .state
            .read()
            .await
            .establishment
            .as_ref()
            .and_then(|establishment| establishment.eid);
        let Some(eid) = eid else {
            let err = ClientError::Validation("no establishment loaded to update".into());
            self.services.report_failure("update_establishment", &err);
            return Err(err);
        };

        self.begin("Updating establishment...", false).await;
        let result = self
            .api
            .post_json(
                update_establishment_route(),
                &UpdateEstablishmentRequest { changes, eid, uid },
            )
            .await;
        let establishment = self
            .settle(
                "update_establishment",
                result,
                false,
                |state, establishment: &Establishment| {
                    state.establishment = Some(establishment.clone());
                },
            )
            .await?;

        info!(%uid, %eid, "updated establishment");
        self.services.notify_success("Establishment updated.");
        Ok(establishment)
    }

    pub async fn get_establishments_by_city(
        &self,
        city: CityId,
        lat: f64,
        lon: f64,
    ) -> Result<NearbyEstablishments, ClientError> {
        self.begin("Getting establishments...", false).await;
        let result = self
            .api
            .post_json(
                establishments_by_city_route(),
                &EstablishmentsByCityRequest {
                    city_id: city,
                    lat,
                    lon,
                },
            )
            .await;
        self.settle(
            "get_establishments_by_city",
            result,
            false,
            |state, nearby: &NearbyEstablishments| {
                state.all_establishments = nearby.establishments.clone();
                state.circles = nearby.circles.clone();
            },
        )
        .await
    }

    /// Submits `order` and then refreshes the establishment list around the
    /// order's location. A failed refresh is reported on its own and does
    /// not turn the accepted submission into an error.
    pub async fn submit_order(&self, order: NewOrder) -> Result<(), ClientError> {
        self.begin("Submitting order...", false).await;
        let result = self
            .api
            .post_json_ack(
                submit_order_route(),
                &SubmitOrderRequest {
                    order: order.clone(),
                },
            )
            .await;
        self.settle("submit_order", result, false, |_, _| {}).await?;

        info!(uid = %order.uid, eid = %order.eid, "submitted order");
        self.services.notify_success("Order submitted.");

        let _ = self
            .get_establishments_by_city(order.cid, order.lat, order.lon)
            .await;
        Ok(())
    }

    pub async fn get_establishment_orders(
        &self,
        eid: EstablishmentId,
    ) -> Result<OrderStats, ClientError> {
        self.begin("Getting orders...", true).await;
        let result = self
            .api
            .post_json::<_, OrderCollection>(
                establishment_orders_route(),
                &EstablishmentOrdersRequest { eid },
            )
            .await
            .map(|collection| {
                let stats = order_stats(&collection);
                (collection, stats)
            });
        let (_, stats) = self
            .settle(
                "get_establishment_orders",
                result,
                true,
                |state, (collection, stats)| {
                    state.first_ts = collection.first_timestamp;
                    state.last_ts = collection.last_timestamp;
                    state.orders = collection.clone();
                    state.amt_orders = stats.amt_orders;
                    state.amt_customers = stats.amt_customers;
                },
            )
            .await?;

        info!(
            %eid,
            amt_orders = stats.amt_orders,
            amt_customers = stats.amt_customers,
            "loaded establishment orders"
        );
        Ok(stats)
    }

    /// Narrows the already loaded orders to the window between `first_ts`
    /// and `last_ts`, widened by the configured tolerance. No request is
    /// made.
    pub async fn get_orders_between_first_and_last_ts(
        &self,
        first_ts: f64,
        last_ts: f64,
    ) -> Vec<OrderBucket> {
        let mut guard = self.state.write().await;
        let filtered = orders_between(
            &guard.orders,
            first_ts,
            last_ts,
            self.order_window_tolerance,
        );
        guard.filtered_orders = filtered.clone();
        filtered
    }

    async fn begin(&self, message: &str, orders: bool) {
        let mut guard = self.state.write().await;
        guard.loading = true;
        guard.loading_msg = message.to_string();
        if orders {
            guard.loading_orders = true;
        }
    }

    /// Clears the loading flags raised by the matching [`Self::begin`] and
    /// either applies a successful response or reports the failure, leaving
    /// the rest of the state untouched.
    async fn settle<T>(
        &self,
        operation: &'static str,
        result: Result<T, ClientError>,
        orders: bool,
        apply: impl FnOnce(&mut EstablishmentState, &T),
    ) -> Result<T, ClientError> {
        {
            let mut guard = self.state.write().await;
            guard.loading = false;
            if orders {
                guard.loading_orders = false;
            }
            if let Ok(value) = &result {
                apply(&mut *guard, value);
            }
        }

        if let Err(err) = &result {
            self.services.report_failure(operation, err);
        }
        result
    }
}

fn created_or_echoed(body: Value, details: &EstablishmentDetails, uid: UserId) -> Establishment {
    let carries_record = body
        .as_object()
        .is_some_and(|object| object.get("eid").is_some_and(|eid| !eid.is_null()));
    if carries_record {
        if let Ok(establishment) = serde_json::from_value::<Establishment>(body) {
            return establishment;
        }
    }
    details.to_establishment(uid)
}

#[cfg(test)]
#[path = "tests/establishment_tests.rs"]
mod tests;
