use actix_web::{test, web, App};
use seat_reservation_rs::api::{self, AppState};
use seat_reservation_rs::context::RuntimeContext;
use seat_reservation_rs::order::OrderRegistry;
use seat_reservation_rs::payment::{PaymentGateway, SimulatedPaymentGateway};
use seat_reservation_rs::seat::SeatRegistry;
use serde_json::json;
use std::sync::Arc;

fn build_state(failure_rate: f64) -> web::Data<AppState> {
    let ctx = RuntimeContext::new_system();
    let seats = Arc::new(SeatRegistry::new(ctx.clone()));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(SimulatedPaymentGateway::new(failure_rate));
    let orders = Arc::new(OrderRegistry::new(ctx, seats.clone(), gateway));
    web::Data::new(AppState { orders, seats })
}

#[actix_web::test]
async fn s1_happy_path_confirms_seats() {
    let state = build_state(0.0);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .set_json(json!({"orderID": "O1", "flightID": "F1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::post()
        .uri("/orders/O1/seats")
        .set_json(json!({"seats": ["1A", "2A"]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::post()
        .uri("/orders/O1/payment")
        .set_json(json!({"code": "E2E-OK"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    let req = test::TestRequest::get().uri("/orders/O1/status").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["State"], "CONFIRMED");

    let req = test::TestRequest::get().uri("/flights/F1/available-seats").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let confirmed = resp["confirmed"].as_array().unwrap();
    assert!(confirmed.iter().any(|v| v == "1A"));
    assert!(confirmed.iter().any(|v| v == "2A"));
}

#[actix_web::test]
async fn s3_cross_order_protection() {
    let state = build_state(0.0);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    for id in ["O3", "O4"] {
        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(json!({"orderID": id, "flightID": "F1"}))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = test::TestRequest::post()
        .uri("/orders/O3/seats")
        .set_json(json!({"seats": ["3A"]}))
        .to_request();
    test::call_service(&app, req).await;
    tokio::task::yield_now().await;

    let req = test::TestRequest::post()
        .uri("/orders/O4/seats")
        .set_json(json!({"seats": ["3A"]}))
        .to_request();
    test::call_service(&app, req).await;
    tokio::task::yield_now().await;

    let req = test::TestRequest::get().uri("/flights/F1/available-seats").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    let held = resp["held"].as_array().unwrap();
    assert!(held.iter().any(|v| v == "3A"));

    let req = test::TestRequest::get().uri("/orders/O4/status").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["State"], "SEATS_SELECTED");
}

#[actix_web::test]
async fn s5_payment_exhaustion_fails_order_and_releases_seats() {
    let state = build_state(1.0);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = test::TestRequest::post()
        .uri("/orders")
        .set_json(json!({"orderID": "O5", "flightID": "F1"}))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/orders/O5/seats")
        .set_json(json!({"seats": ["4A"]}))
        .to_request();
    test::call_service(&app, req).await;
    tokio::task::yield_now().await;

    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/orders/O5/payment")
            .set_json(json!({"code": "bad"}))
            .to_request();
        test::call_service(&app, req).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    let req = test::TestRequest::get().uri("/orders/O5/status").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["State"], "FAILED");
    assert_eq!(resp["AttemptsLeft"], 0);
}

#[actix_web::test]
async fn unknown_order_status_is_404() {
    let state = build_state(0.0);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = test::TestRequest::get().uri("/orders/ghost/status").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn health_check_reports_ok() {
    let state = build_state(0.0);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure)).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["status"], "healthy");
}
