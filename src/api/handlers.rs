use super::dto::{
    CreateOrderRequest, CreateOrderResponse, HealthResponse, SubmitPaymentRequest, UpdateSeatsRequest,
};
use crate::availability;
use crate::errors::AppError;
use crate::order::OrderRegistry;
use crate::seat::SeatRegistry;
use actix_web::{web, HttpResponse};
use bytes::Bytes;
use futures::stream;
use std::sync::Arc;
use std::time::Duration;

pub struct AppState {
    pub orders: Arc<OrderRegistry>,
    pub seats: Arc<SeatRegistry>,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "seat-reservation-api".to_string(),
    })
}

pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    if body.order_id.trim().is_empty() || body.flight_id.trim().is_empty() {
        return Err(AppError::BadRequest("orderID and flightID are required".to_string()));
    }

    let handle = state.orders.get_or_create(&body.order_id, &body.flight_id);
    Ok(HttpResponse::Created().json(CreateOrderResponse { order_id: handle.order_id.clone() }))
}

pub async fn update_seats(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateSeatsRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let handle = state
        .orders
        .get(&order_id)
        .ok_or_else(|| AppError::Internal(format!("order {order_id} could not be signaled")))?;

    handle
        .update_seats(body.seats.clone())
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().finish())
}

pub async fn submit_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SubmitPaymentRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    if body.code.trim().is_empty() {
        return Err(AppError::BadRequest("code is required".to_string()));
    }

    let handle = state
        .orders
        .get(&order_id)
        .ok_or_else(|| AppError::Internal(format!("order {order_id} could not be signaled")))?;

    handle
        .submit_payment(body.code.clone())
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().finish())
}

pub async fn get_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let handle = state
        .orders
        .get(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let status = handle
        .get_status()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(status))
}

/// SSE status stream (§4.4): one `OrderState` event per second until the
/// client disconnects or the order reaches a terminal state, then one
/// final event and close.
pub async fn stream_events(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let handle = state
        .orders
        .get(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let body = stream::unfold(Some(handle), |handle| async move {
        let handle = handle?;
        tokio::time::sleep(Duration::from_secs(1)).await;

        let status = handle.get_status().await.ok()?;
        let payload = serde_json::to_string(&status).ok()?;
        let frame = format!("data: {payload}\n\n");

        let next = if status.is_terminal() { None } else { Some(handle) };
        Some((Ok::<Bytes, actix_web::Error>(Bytes::from(frame)), next))
    });

    Ok(HttpResponse::Ok().content_type("text/event-stream").streaming(body))
}

pub async fn available_seats(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let flight_id = path.into_inner();
    if flight_id.trim().is_empty() {
        return Err(AppError::BadRequest("flightID is required".to_string()));
    }

    let result = availability::compute(&state.seats, &flight_id).await;
    Ok(HttpResponse::Ok().json(result))
}
