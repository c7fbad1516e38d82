use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "flightID")]
    pub flight_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    #[serde(rename = "orderId")]
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSeatsRequest {
    pub seats: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitPaymentRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}
