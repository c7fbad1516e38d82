use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Errors surfaced across the HTTP boundary (§7: client input / unknown
/// workflow / internal).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("order not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::BadRequest(msg) => HttpResponse::BadRequest().json(ErrorBody { error: msg.clone() }),
            AppError::NotFound(msg) => HttpResponse::NotFound().json(ErrorBody { error: msg.clone() }),
            AppError::Internal(msg) => HttpResponse::InternalServerError().json(ErrorBody { error: msg.clone() }),
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

/// Command Dispatch failure: retries exhausted or the seat entity is gone.
/// Per spec.md §4.3/§7 these are absorbed by the orchestrator's fan-out
/// loops, logged, and never bubble to the HTTP layer.
#[derive(Debug, Error, Clone)]
pub enum DispatchError {
    #[error("dispatch retries exhausted")]
    RetriesExhausted,
    #[error("dispatch exceeded overall deadline")]
    DeadlineExceeded,
    #[error("seat entity unreachable")]
    EntityGone,
}

/// Payment gateway failure. Consumed entirely by the order orchestrator's
/// attempt-budget logic; never surfaced as an HTTP error.
#[derive(Debug, Error, Clone)]
pub enum PaymentError {
    #[error("payment rejected: {0}")]
    Rejected(String),
}
