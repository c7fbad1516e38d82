use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use seat_reservation_rs::api::{self, AppState};
use seat_reservation_rs::config::Settings;
use seat_reservation_rs::context::RuntimeContext;
use seat_reservation_rs::cors_middleware::PreflightNoContent;
use seat_reservation_rs::order::OrderRegistry;
use seat_reservation_rs::payment::{PaymentGateway, SimulatedPaymentGateway};
use seat_reservation_rs::seat::SeatRegistry;
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .json()
        .init();

    let settings = Settings::new()?;
    info!(
        http_port = settings.http_port,
        integration = settings.integration,
        order_task_queue = %settings.order_task_queue,
        seat_task_queue = %settings.seat_task_queue,
        "starting seat reservation service"
    );

    let ctx = RuntimeContext::new_system();
    let seats = Arc::new(SeatRegistry::new(ctx.clone()));
    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(SimulatedPaymentGateway::new(settings.payment_failure_rate));
    let orders = Arc::new(OrderRegistry::new(ctx, seats.clone(), gateway));

    let bind_address = format!("0.0.0.0:{}", settings.http_port);
    let state = web::Data::new(AppState { orders, seats });

    info!(%bind_address, "HTTP server listening");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_header("Content-Type")
            .max_age(3600);

        App::new()
            .wrap(PreflightNoContent)
            .wrap(cors)
            .app_data(state.clone())
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
