use super::orchestrator::{self, OrderHandle};
use crate::context::RuntimeContext;
use crate::payment::PaymentGateway;
use crate::seat::SeatRegistry;
use dashmap::DashMap;
use std::sync::Arc;

/// Registry of live order orchestrator tasks, keyed by `orderID`.
pub struct OrderRegistry {
    orders: DashMap<String, OrderHandle>,
    ctx: RuntimeContext,
    seats: Arc<SeatRegistry>,
    gateway: Arc<dyn PaymentGateway>,
}

impl OrderRegistry {
    pub fn new(ctx: RuntimeContext, seats: Arc<SeatRegistry>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { orders: DashMap::new(), ctx, seats, gateway }
    }

    /// `POST /orders` (§6): idempotent by design. Re-submitting the same
    /// `orderID` returns the handle to the already-running orchestrator
    /// rather than erroring or spawning a duplicate, avoiding the need to
    /// model a workflow-already-started error for a thin HTTP façade.
    pub fn get_or_create(&self, order_id: &str, flight_id: &str) -> OrderHandle {
        if let Some(handle) = self.orders.get(order_id) {
            return handle.clone();
        }
        self.orders
            .entry(order_id.to_string())
            .or_insert_with(|| {
                orchestrator::spawn(
                    order_id.to_string(),
                    flight_id.to_string(),
                    self.ctx.clone(),
                    self.seats.clone(),
                    self.gateway.clone(),
                )
            })
            .clone()
    }

    pub fn get(&self, order_id: &str) -> Option<OrderHandle> {
        self.orders.get(order_id).map(|h| h.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::SimulatedPaymentGateway;

    fn registry() -> OrderRegistry {
        let ctx = RuntimeContext::new_system();
        let seats = Arc::new(SeatRegistry::new(ctx.clone()));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(SimulatedPaymentGateway::new(0.0));
        OrderRegistry::new(ctx, seats, gateway)
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let reg = registry();
        assert!(reg.get("ghost").is_none());
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let reg = registry();
        let h1 = reg.get_or_create("O1", "F1");
        let h2 = reg.get_or_create("O1", "F1");
        h1.update_seats(vec!["1A".into()]).unwrap();
        tokio::task::yield_now().await;
        let status = h2.get_status().await.unwrap();
        assert_eq!(status.state, "SEATS_SELECTED");
    }
}
