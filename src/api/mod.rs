pub mod dto;
pub mod handlers;

pub use handlers::AppState;

use actix_web::web;

/// Registers the HTTP surface described in §6.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/orders", web::post().to(handlers::create_order))
        .route("/orders/{id}/seats", web::post().to(handlers::update_seats))
        .route("/orders/{id}/payment", web::post().to(handlers::submit_payment))
        .route("/orders/{id}/status", web::get().to(handlers::get_status))
        .route("/orders/{id}/events", web::get().to(handlers::stream_events))
        .route("/flights/{flightID}/available-seats", web::get().to(handlers::available_seats));
}
