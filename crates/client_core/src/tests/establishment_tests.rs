use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use shared::{
    domain::{CityId, EstablishmentDetails, EstablishmentId, NewOrder, UserId},
    protocol::{
        create_establishment_route, establishment_orders_route, establishments_by_city_route,
        get_establishment_route, submit_order_route, update_establishment_route,
    },
};

use crate::{error::ClientError, mock_backend::Harness, services::Severity};

fn details(name: &str) -> EstablishmentDetails {
    EstablishmentDetails {
        name: Some(name.to_string()),
        address: Some("12 Rue Ste-Catherine".to_string()),
        lat: Some(45.5),
        lon: Some(-73.56),
        ..EstablishmentDetails::default()
    }
}

fn sample_order() -> NewOrder {
    NewOrder {
        uid: UserId(5),
        eid: EstablishmentId(11),
        cid: CityId("Montreal".into()),
        lat: 45.5,
        lon: -73.56,
        items: vec![json!({"name": "poutine", "qty": 2})],
        total: 21.0,
    }
}

#[tokio::test]
async fn get_establishment_replaces_record() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond(
            get_establishment_route(),
            json!({"eid": 11, "uid": 3, "name": "Chez Ana", "address": "1 Main", "cuisine": "bistro"}),
        )
        .await;

    let establishment = harness
        .app
        .establishments
        .get_establishment_by_uid(UserId(3))
        .await
        .expect("fetch");
    assert_eq!(establishment.eid, Some(EstablishmentId(11)));
    assert_eq!(establishment.attributes.get("cuisine"), Some(&json!("bistro")));

    let calls = harness.backend.calls_to(get_establishment_route()).await;
    assert_eq!(calls[0].body, json!({"uid": 3}));

    let state = harness.app.establishments.snapshot().await;
    assert_eq!(state.establishment, Some(establishment));
    assert!(!state.loading);
    assert!(harness.recorder.notifications().is_empty());
}

#[tokio::test]
async fn failed_fetch_is_reported_and_clears_loading() {
    let harness = Harness::start().await;
    harness
        .backend
        .fail(
            get_establishment_route(),
            StatusCode::NOT_FOUND,
            json!({"code": "not_found", "message": "no establishment for uid 3"}),
        )
        .await;

    let err = harness
        .app
        .establishments
        .get_establishment_by_uid(UserId(3))
        .await
        .expect_err("must fail");
    match err {
        ClientError::Status {
            status, message, ..
        } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(message, "no establishment for uid 3");
        }
        other => panic!("unexpected error: {other}"),
    }

    let state = harness.app.establishments.snapshot().await;
    assert!(!state.loading);
    assert_eq!(state.establishment, None);
    assert_eq!(
        harness.recorder.notifications()[0].severity,
        Severity::Error
    );
}

#[tokio::test]
async fn create_uses_server_record_when_returned() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond(
            create_establishment_route(),
            json!({"eid": 21, "uid": 3, "name": "Chez Ana", "address": "12 Rue Ste-Catherine"}),
        )
        .await;

    let created = harness
        .app
        .establishments
        .create_establishment(UserId(3), details("Chez Ana"))
        .await
        .expect("create");
    assert_eq!(created.eid, Some(EstablishmentId(21)));

    let calls = harness.backend.calls_to(create_establishment_route()).await;
    assert_eq!(
        calls[0].body,
        json!({
            "uid": 3,
            "establishment": {
                "name": "Chez Ana",
                "address": "12 Rue Ste-Catherine",
                "lat": 45.5,
                "lon": -73.56
            }
        })
    );

    let notifications = harness.recorder.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].severity, Severity::Success);
    assert_eq!(notifications[0].detail, "Establishment created.");
}

#[tokio::test]
async fn create_falls_back_to_submitted_details_on_plain_ack() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond(create_establishment_route(), json!({"status": "ok"}))
        .await;

    let created = harness
        .app
        .establishments
        .create_establishment(UserId(3), details("Chez Ana"))
        .await
        .expect("create");
    assert_eq!(created.eid, None);
    assert_eq!(created.uid, Some(UserId(3)));
    assert_eq!(created.name, "Chez Ana");
    assert_eq!(
        harness.app.establishments.establishment().await,
        Some(created)
    );
}

#[tokio::test]
async fn create_keeps_submitted_details_when_ack_body_is_empty() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond_raw(create_establishment_route(), StatusCode::OK, "", None)
        .await;

    let created = harness
        .app
        .establishments
        .create_establishment(UserId(3), details("Chez Ana"))
        .await
        .expect("empty ack still creates");
    assert_eq!(created.uid, Some(UserId(3)));
    assert_eq!(created.name, "Chez Ana");
    assert_eq!(created.lat, Some(45.5));
    assert_eq!(
        harness.app.establishments.establishment().await,
        Some(created)
    );

    let notifications = harness.recorder.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].severity, Severity::Success);
}

#[tokio::test]
async fn update_sends_changes_for_loaded_establishment() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond(
            get_establishment_route(),
            json!({"eid": 11, "uid": 3, "name": "Old name"}),
        )
        .await;
    harness
        .backend
        .respond(
            update_establishment_route(),
            json!({"eid": 11, "uid": 3, "name": "New name"}),
        )
        .await;
    harness
        .app
        .establishments
        .get_establishment_by_uid(UserId(3))
        .await
        .expect("fetch");

    let changes = EstablishmentDetails {
        name: Some("New name".into()),
        ..EstablishmentDetails::default()
    };
    let updated = harness
        .app
        .establishments
        .update_establishment(UserId(3), changes)
        .await
        .expect("update");
    assert_eq!(updated.name, "New name");

    let calls = harness.backend.calls_to(update_establishment_route()).await;
    assert_eq!(
        calls[0].body,
        json!({"changes": {"name": "New name"}, "eid": 11, "uid": 3})
    );
    assert_eq!(
        harness.recorder.notifications()[0].detail,
        "Establishment updated."
    );
}

#[tokio::test]
async fn update_without_loaded_establishment_is_rejected_locally() {
    let harness = Harness::start().await;

    let err = harness
        .app
        .establishments
        .update_establishment(UserId(3), details("x"))
        .await
        .expect_err("must fail");
    assert!(err.is_validation());
    assert!(harness.backend.calls().await.is_empty());
    assert_eq!(harness.recorder.notifications()[0].severity, Severity::Warn);
}

#[tokio::test]
async fn nearby_lookup_replaces_lists_wholesale() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond_with(
            establishments_by_city_route(),
            StatusCode::OK,
            json!({
                "establishments": [{"eid": 1, "name": "A"}, {"eid": 2, "name": "B"}],
                "circles": [{"lat": 45.5, "lon": -73.5, "radius": 1000}]
            }),
            None,
        )
        .await;
    harness
        .backend
        .respond_with(
            establishments_by_city_route(),
            StatusCode::OK,
            json!({"establishments": [{"eid": 3, "name": "C"}], "circles": []}),
            None,
        )
        .await;

    let city = CityId("Montreal".into());
    let first = harness
        .app
        .establishments
        .get_establishments_by_city(city.clone(), 45.5, -73.5)
        .await
        .expect("first lookup");
    assert_eq!(first.establishments.len(), 2);
    assert_eq!(first.circles[0].radius, 1000.0);

    harness
        .app
        .establishments
        .get_establishments_by_city(city, 45.5, -73.5)
        .await
        .expect("second lookup");
    let state = harness.app.establishments.snapshot().await;
    assert_eq!(state.all_establishments.len(), 1);
    assert_eq!(state.all_establishments[0].name, "C");
    assert!(state.circles.is_empty());

    let calls = harness
        .backend
        .calls_to(establishments_by_city_route())
        .await;
    assert_eq!(
        calls[0].body,
        json!({"city_id": "Montreal", "lat": 45.5, "lon": -73.5})
    );
}

#[tokio::test]
async fn submit_order_notifies_then_refreshes_by_order_location() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond(
            establishments_by_city_route(),
            json!({"establishments": [{"eid": 11, "name": "Chez Ana"}], "circles": []}),
        )
        .await;

    harness
        .app
        .establishments
        .submit_order(sample_order())
        .await
        .expect("submit");

    let calls = harness.backend.calls().await;
    let routes: Vec<&str> = calls.iter().map(|call| call.route.as_str()).collect();
    assert_eq!(
        routes,
        vec![submit_order_route(), establishments_by_city_route()]
    );
    assert_eq!(calls[0].body["order"]["eid"], json!(11));
    assert_eq!(
        calls[1].body,
        json!({"city_id": "Montreal", "lat": 45.5, "lon": -73.56})
    );
    assert_eq!(
        harness.recorder.notifications()[0].detail,
        "Order submitted."
    );
    assert_eq!(harness.app.establishments.all_establishments().await.len(), 1);
}

#[tokio::test]
async fn rejected_order_skips_refresh() {
    let harness = Harness::start().await;
    harness
        .backend
        .fail(
            submit_order_route(),
            StatusCode::INTERNAL_SERVER_ERROR,
            json!("boom"),
        )
        .await;

    let err = harness
        .app
        .establishments
        .submit_order(sample_order())
        .await
        .expect_err("must fail");
    assert!(matches!(err, ClientError::Status { .. }));
    assert!(harness
        .backend
        .calls_to(establishments_by_city_route())
        .await
        .is_empty());
}

#[tokio::test]
async fn refresh_failure_after_accepted_order_is_only_reported() {
    let harness = Harness::start().await;
    harness
        .backend
        .fail(
            establishments_by_city_route(),
            StatusCode::BAD_GATEWAY,
            json!({}),
        )
        .await;

    harness
        .app
        .establishments
        .submit_order(sample_order())
        .await
        .expect("submission accepted");

    let severities: Vec<Severity> = harness
        .recorder
        .notifications()
        .iter()
        .map(|notification| notification.severity)
        .collect();
    assert_eq!(severities, vec![Severity::Success, Severity::Error]);
}

#[tokio::test]
async fn order_dashboard_counts_orders_and_customers() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond(
            establishment_orders_route(),
            json!({
                "1": {"orders": [{"uid": 5, "created_at": 100, "total": 10}]},
                "first_ts": 100,
                "last_ts": 100
            }),
        )
        .await;

    let stats = harness
        .app
        .establishments
        .get_establishment_orders(EstablishmentId(11))
        .await
        .expect("orders");
    assert_eq!(stats.amt_orders, 1);
    assert_eq!(stats.amt_customers, 1);

    let state = harness.app.establishments.snapshot().await;
    assert_eq!(state.amt_orders, 1);
    assert_eq!(state.amt_customers, 1);
    assert_eq!(state.first_ts, Some(100.0));
    assert_eq!(state.last_ts, Some(100.0));
    assert!(!state.loading_orders);

    let calls = harness.backend.calls_to(establishment_orders_route()).await;
    assert_eq!(calls[0].body, json!({"eid": 11}));
}

#[tokio::test]
async fn filter_uses_loaded_orders_with_tolerance() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond(
            establishment_orders_route(),
            json!({
                "1": {"orders": [
                    {"uid": 5, "created_at": 96, "total": 10},
                    {"uid": 6, "created_at": 300, "total": 99}
                ], "total": 109},
                "2": {"orders": [{"uid": 5, "created_at": 204, "total": 2.5}], "total": 2.5},
                "3": {"orders": [{"uid": 7, "created_at": 206, "total": 1}], "total": 1},
                "first_ts": 96,
                "last_ts": 300,
                "overall_total": 112.5
            }),
        )
        .await;
    harness
        .app
        .establishments
        .get_establishment_orders(EstablishmentId(11))
        .await
        .expect("orders");
    let calls_before = harness.backend.calls().await.len();

    let filtered = harness
        .app
        .establishments
        .get_orders_between_first_and_last_ts(100.0, 200.0)
        .await;

    assert_eq!(harness.backend.calls().await.len(), calls_before);
    let indexes: Vec<u64> = filtered.iter().map(|bucket| bucket.index).collect();
    assert_eq!(indexes, vec![1, 2]);
    assert_eq!(filtered[0].orders.len(), 1);
    assert_eq!(filtered[0].total, 10.0);
    assert_eq!(filtered[1].total, 2.5);
    assert_eq!(
        harness.app.establishments.snapshot().await.filtered_orders,
        filtered
    );
}

#[tokio::test]
async fn overlapping_fetches_keep_the_last_response() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond_with(
            get_establishment_route(),
            StatusCode::OK,
            json!({"eid": 1, "name": "slow"}),
            Some(Duration::from_millis(200)),
        )
        .await;
    harness
        .backend
        .respond_with(
            get_establishment_route(),
            StatusCode::OK,
            json!({"eid": 2, "name": "fast"}),
            None,
        )
        .await;

    let store = &harness.app.establishments;
    let slow = store.get_establishment_by_uid(UserId(3));
    let fast = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.get_establishment_by_uid(UserId(3)).await
    };
    let (slow, fast) = tokio::join!(slow, fast);
    assert_eq!(slow.expect("slow").name, "slow");
    assert_eq!(fast.expect("fast").name, "fast");

    let current = store.establishment().await.expect("record");
    assert_eq!(current.name, "slow");
}

#[tokio::test]
async fn orders_spinner_outlives_unrelated_fetch() {
    let harness = Harness::start().await;
    harness
        .backend
        .respond_with(
            establishment_orders_route(),
            StatusCode::OK,
            json!({"1": {"orders": [{"uid": 5, "created_at": 100, "total": 10}]}}),
            Some(Duration::from_millis(400)),
        )
        .await;
    harness
        .backend
        .respond(get_establishment_route(), json!({"eid": 11, "name": "Chez Ana"}))
        .await;

    let store = &harness.app.establishments;
    let orders = store.get_establishment_orders(EstablishmentId(11));
    let details = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        store
            .get_establishment_by_uid(UserId(3))
            .await
            .expect("fetch");
        store.snapshot().await
    };
    let (orders, mid_flight) = tokio::join!(orders, details);

    assert!(mid_flight.loading_orders);
    assert_eq!(mid_flight.loading_msg, "Getting establishment details...");
    assert_eq!(orders.expect("orders").amt_orders, 1);
    assert!(!store.snapshot().await.loading_orders);
}
