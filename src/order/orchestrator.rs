use crate::context::RuntimeContext;
use crate::errors::DispatchError;
use crate::model::{
    diff_seats, OrderLifecycleState, OrderStateDto, SeatCommand, HOLD_TTL, INITIAL_ATTEMPTS,
};
use crate::payment::PaymentGateway;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::seat::SeatRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{info, warn};

/// Per-seat-command deadline (§5: ScheduleToClose = 60s covers retries;
/// this is the budget handed to `SeatRegistry::dispatch`, which already
/// applies CD's 5-attempt retry policy internally).
const DISPATCH_DEADLINE: Duration = Duration::from_secs(60);

/// Payment activity's own StartToClose budget (§5), applied per attempt
/// inside the payment retry policy.
const PAYMENT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

enum OrderMessage {
    UpdateSeats(Vec<String>),
    SubmitPayment(String),
    Query(oneshot::Sender<OrderStateDto>),
}

#[derive(Clone)]
pub struct OrderHandle {
    pub order_id: String,
    pub flight_id: String,
    tx: mpsc::UnboundedSender<OrderMessage>,
}

impl OrderHandle {
    pub fn update_seats(&self, seats: Vec<String>) -> Result<(), DispatchError> {
        self.tx
            .send(OrderMessage::UpdateSeats(seats))
            .map_err(|_| DispatchError::EntityGone)
    }

    pub fn submit_payment(&self, code: String) -> Result<(), DispatchError> {
        self.tx
            .send(OrderMessage::SubmitPayment(code))
            .map_err(|_| DispatchError::EntityGone)
    }

    pub async fn get_status(&self) -> Result<OrderStateDto, DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(OrderMessage::Query(tx))
            .map_err(|_| DispatchError::EntityGone)?;
        rx.await.map_err(|_| DispatchError::EntityGone)
    }
}

struct OrderState {
    state: OrderLifecycleState,
    seats: Vec<String>,
    hold_expires_instant: Option<Instant>,
    hold_expires_display: Option<chrono::DateTime<chrono::Utc>>,
    attempts_left: u32,
    last_payment_err: String,
}

impl OrderState {
    fn new() -> Self {
        Self {
            state: OrderLifecycleState::Pending,
            seats: Vec::new(),
            hold_expires_instant: None,
            hold_expires_display: None,
            attempts_left: INITIAL_ATTEMPTS,
            last_payment_err: String::new(),
        }
    }

    fn refresh_hold(&mut self, ctx: &RuntimeContext, now: Instant) {
        self.hold_expires_instant = Some(now + HOLD_TTL);
        self.hold_expires_display =
            chrono::Duration::from_std(HOLD_TTL).ok().map(|d| ctx.time.now() + d);
    }

    fn to_dto(&self) -> OrderStateDto {
        OrderStateDto {
            state: self.state.to_string(),
            seats: self.seats.clone(),
            hold_expires_at: self.hold_expires_display,
            attempts_left: self.attempts_left,
            last_payment_err: self.last_payment_err.clone(),
        }
    }
}

/// Spawns an order orchestrator task and returns a handle to it. Runs the
/// order to a terminal state, then keeps serving `GetStatus` queries for
/// the lifetime of the process (§4.4: queries stay consistent with the
/// entity's last applied command, even after the order's own loop exits).
pub fn spawn(
    order_id: String,
    flight_id: String,
    ctx: RuntimeContext,
    seats_registry: Arc<SeatRegistry>,
    gateway: Arc<dyn PaymentGateway>,
) -> OrderHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = OrderHandle { order_id: order_id.clone(), flight_id: flight_id.clone(), tx };
    tokio::spawn(run(order_id, flight_id, ctx, seats_registry, gateway, rx));
    handle
}

async fn dispatch_to_seats(
    seats_registry: &SeatRegistry,
    flight_id: &str,
    order_id: &str,
    seat_ids: &[String],
    make_cmd: impl Fn() -> SeatCommand,
) {
    for seat_id in seat_ids {
        let cmd = make_cmd();
        if let Err(e) = seats_registry.dispatch(flight_id, seat_id, cmd, DISPATCH_DEADLINE).await {
            warn!(%flight_id, seat_id, %order_id, error = %e, "command dispatch to seat failed");
        }
    }
}

async fn run(
    order_id: String,
    flight_id: String,
    ctx: RuntimeContext,
    seats_registry: Arc<SeatRegistry>,
    gateway: Arc<dyn PaymentGateway>,
    mut rx: mpsc::UnboundedReceiver<OrderMessage>,
) {
    let mut order = OrderState::new();
    info!(%order_id, %flight_id, "order orchestrator started, waiting for initial seat selection");

    'main: loop {
        if order.state.is_terminal() {
            break;
        }

        let deadline = order.hold_expires_instant;
        let sleep = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    None => {
                        info!(%order_id, "order orchestrator channel closed, stopping");
                        return;
                    }
                    Some(OrderMessage::Query(reply)) => {
                        let _ = reply.send(order.to_dto());
                    }
                    Some(OrderMessage::UpdateSeats(new_seats)) => {
                        handle_update_seats(&mut order, &ctx, &seats_registry, &flight_id, &order_id, new_seats).await;
                    }
                    Some(OrderMessage::SubmitPayment(code)) => {
                        handle_submit_payment(&mut order, gateway.as_ref(), &order_id, code).await;
                    }
                }
            }
            _ = sleep => {
                info!(%order_id, "hold TTL expired with no payment, order EXPIRED");
                order.state = OrderLifecycleState::Expired;
                break 'main;
            }
        }
    }

    run_post_loop_actions(&order, &seats_registry, &flight_id, &order_id).await;

    // Order stays queryable indefinitely after reaching a terminal state;
    // further signals are ignored (invariant: terminal state never changes).
    loop {
        match rx.recv().await {
            None => return,
            Some(OrderMessage::Query(reply)) => {
                let _ = reply.send(order.to_dto());
            }
            Some(OrderMessage::UpdateSeats(_)) => {
                warn!(%order_id, "UpdateSeats ignored: order already terminal");
            }
            Some(OrderMessage::SubmitPayment(_)) => {
                warn!(%order_id, "SubmitPayment ignored: order already terminal");
            }
        }
    }
}

async fn handle_update_seats(
    order: &mut OrderState,
    ctx: &RuntimeContext,
    seats_registry: &SeatRegistry,
    flight_id: &str,
    order_id: &str,
    new_seats: Vec<String>,
) {
    let now = Instant::now();

    if order.state == OrderLifecycleState::Pending {
        dispatch_to_seats(seats_registry, flight_id, order_id, &new_seats, || {
            SeatCommand::hold(order_id, HOLD_TTL)
        })
        .await;
        order.seats = new_seats;
        order.state = OrderLifecycleState::SeatsSelected;
        order.attempts_left = INITIAL_ATTEMPTS;
        order.refresh_hold(ctx, now);
        info!(%order_id, seats = ?order.seats, "seats selected, holds placed");
        return;
    }

    let (to_release, to_hold) = diff_seats(&order.seats, &new_seats);
    dispatch_to_seats(seats_registry, flight_id, order_id, &to_release, || SeatCommand::release(order_id)).await;
    dispatch_to_seats(seats_registry, flight_id, order_id, &to_hold, || {
        SeatCommand::hold(order_id, HOLD_TTL)
    })
    .await;

    order.seats = new_seats;
    order.refresh_hold(ctx, now);
    info!(%order_id, released = ?to_release, held = ?to_hold, "seat selection revised");
}

async fn handle_submit_payment(
    order: &mut OrderState,
    gateway: &dyn PaymentGateway,
    order_id: &str,
    code: String,
) {
    if order.attempts_left == 0 {
        warn!(%order_id, "SubmitPayment ignored: no attempts left");
        return;
    }

    order.attempts_left -= 1;
    let policy = RetryPolicy::payment();
    let result = retry_with_backoff(&policy, || {
        let gateway = gateway;
        let code = code.clone();
        async move {
            match tokio::time::timeout(PAYMENT_ATTEMPT_TIMEOUT, gateway.validate(&code)).await {
                Ok(result) => result,
                Err(_) => Err(crate::errors::PaymentError::Rejected("payment gateway timed out".to_string())),
            }
        }
    })
    .await;

    match result {
        Ok(()) => {
            info!(%order_id, "payment accepted");
            order.state = OrderLifecycleState::Confirmed;
        }
        Err(e) => {
            order.last_payment_err = e.to_string();
            if order.attempts_left > 0 {
                warn!(%order_id, attempts_left = order.attempts_left, error = %e, "payment rejected, attempts remain");
            } else {
                warn!(%order_id, error = %e, "payment rejected, attempts exhausted, order FAILED");
                order.state = OrderLifecycleState::Failed;
            }
        }
    }
}

/// Placeholder notification activity (§4.3, §4.4): "e.g., send confirmation
/// email, finalize booking". Best-effort — its failure never reopens a
/// terminal order (§7).
async fn confirm_order_activity(order_id: &str) {
    info!(%order_id, "confirming order");
}

/// Placeholder notification activity (§4.3, §4.4): "e.g., send failure
/// notification". Best-effort, advisory only.
async fn fail_order_activity(order_id: &str) {
    warn!(%order_id, "failing order");
}

async fn run_post_loop_actions(
    order: &OrderState,
    seats_registry: &SeatRegistry,
    flight_id: &str,
    order_id: &str,
) {
    match order.state {
        OrderLifecycleState::Confirmed => {
            confirm_order_activity(order_id).await;
            dispatch_to_seats(seats_registry, flight_id, order_id, &order.seats, || {
                SeatCommand::confirm(order_id)
            })
            .await;
        }
        OrderLifecycleState::Failed | OrderLifecycleState::Expired => {
            dispatch_to_seats(seats_registry, flight_id, order_id, &order.seats, || {
                SeatCommand::release(order_id)
            })
            .await;
            fail_order_activity(order_id).await;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::SimulatedPaymentGateway;

    fn new_order(order_id: &str, flight_id: &str) -> (OrderHandle, Arc<SeatRegistry>) {
        let ctx = RuntimeContext::new_system();
        let seats = Arc::new(SeatRegistry::new(ctx.clone()));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(SimulatedPaymentGateway::new(0.0));
        let handle = spawn(order_id.to_string(), flight_id.to_string(), ctx, seats.clone(), gateway);
        (handle, seats)
    }

    #[tokio::test]
    async fn order_starts_pending() {
        let (handle, _seats) = new_order("O1", "F1");
        let status = handle.get_status().await.unwrap();
        assert_eq!(status.state, "PENDING");
    }

    #[tokio::test]
    async fn first_update_seats_holds_and_transitions() {
        let (handle, seats) = new_order("O1", "F1");
        handle.update_seats(vec!["1A".into(), "2A".into()]).unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let status = handle.get_status().await.unwrap();
        assert_eq!(status.state, "SEATS_SELECTED");
        assert_eq!(status.attempts_left, 3);

        let snap = seats.query("F1", "1A").await.unwrap();
        assert!(snap.is_held);
        assert_eq!(snap.held_by, "O1");
    }

    #[tokio::test]
    async fn happy_path_confirms_seats() {
        let (handle, seats) = new_order("O1", "F1");
        handle.update_seats(vec!["1A".into(), "2A".into()]).unwrap();
        tokio::task::yield_now().await;
        handle.submit_payment("E2E-OK".to_string()).unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let status = handle.get_status().await.unwrap();
        assert_eq!(status.state, "CONFIRMED");

        let snap = seats.query("F1", "1A").await.unwrap();
        assert!(snap.is_confirmed);
        assert_eq!(snap.confirmed_by, "O1");
    }

    #[tokio::test]
    async fn empty_seat_selection_still_transitions_to_seats_selected() {
        let (handle, _seats) = new_order("O1", "F1");
        handle.update_seats(vec![]).unwrap();
        tokio::task::yield_now().await;
        let status = handle.get_status().await.unwrap();
        assert_eq!(status.state, "SEATS_SELECTED");
        assert!(status.seats.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn payment_attempts_never_go_below_zero() {
        let ctx = RuntimeContext::new_system();
        let seats = Arc::new(SeatRegistry::new(ctx.clone()));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(SimulatedPaymentGateway::new(1.0));
        let handle = spawn("O5".to_string(), "F1".to_string(), ctx, seats.clone(), gateway);

        handle.update_seats(vec!["4A".into()]).unwrap();
        tokio::task::yield_now().await;

        for _ in 0..5 {
            let _ = handle.submit_payment("bad".to_string());
            // each rejected submission drives the internal 3-attempt
            // payment retry policy to exhaustion before the orchestrator
            // accepts the next signal; paused time auto-advances through
            // those waits once every task is parked on a timer.
            tokio::time::sleep(Duration::from_secs(10)).await;
        }

        let status = handle.get_status().await.unwrap();
        assert_eq!(status.attempts_left, 0);
        assert_eq!(status.state, "FAILED");
    }

    #[tokio::test]
    async fn seat_revision_releases_and_holds_correctly() {
        let (handle, seats) = new_order("O1", "F1");
        handle.update_seats(vec!["5A".into(), "5B".into()]).unwrap();
        tokio::task::yield_now().await;
        handle.update_seats(vec!["5A".into(), "5C".into()]).unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert!(!seats.query("F1", "5B").await.unwrap().is_held);
        assert!(seats.query("F1", "5C").await.unwrap().is_held);
        assert!(seats.query("F1", "5A").await.unwrap().is_held);
    }
}
