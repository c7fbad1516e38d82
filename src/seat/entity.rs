use crate::context::RuntimeContext;
use crate::errors::DispatchError;
use crate::model::{CommandType, SeatCommand, SeatSnapshot};
use chrono::Duration as ChronoDuration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{info, warn};

/// After this many processed commands, the entity logs a continue-as-new
/// and resets its counter (§4.1). There is no real event log in this
/// in-process DES to truncate; the snapshot carried forward is simply the
/// `SeatState` already held by the task.
const TRUNCATE_AFTER: u64 = 1000;

enum SeatMessage {
    Command(SeatCommand),
    Query(oneshot::Sender<SeatSnapshot>),
}

/// Handle to a running seat entity task. Cloning shares the same channel,
/// so every clone talks to the same single-threaded actor.
#[derive(Clone)]
pub struct SeatHandle {
    pub flight_id: String,
    pub seat_id: String,
    tx: mpsc::UnboundedSender<SeatMessage>,
}

impl SeatHandle {
    /// Enqueue a command. Returns an error only if the entity task has
    /// died (e.g. panicked) and no longer drains its channel.
    pub fn send_command(&self, cmd: SeatCommand) -> Result<(), DispatchError> {
        self.tx
            .send(SeatMessage::Command(cmd))
            .map_err(|_| DispatchError::EntityGone)
    }

    pub async fn query(&self) -> Result<SeatSnapshot, DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(SeatMessage::Query(tx))
            .map_err(|_| DispatchError::EntityGone)?;
        rx.await.map_err(|_| DispatchError::EntityGone)
    }
}

#[derive(Default)]
struct SeatState {
    is_held: bool,
    is_confirmed: bool,
    held_by: String,
    confirmed_by: String,
    /// Scheduling deadline (tokio virtual/real clock).
    expires_instant: Option<Instant>,
    /// Display-only timestamp surfaced via queries.
    expires_display: Option<chrono::DateTime<chrono::Utc>>,
}

impl SeatState {
    fn snapshot(&self) -> SeatSnapshot {
        SeatSnapshot {
            is_held: self.is_held,
            is_confirmed: self.is_confirmed,
            held_by: self.held_by.clone(),
            confirmed_by: self.confirmed_by.clone(),
            expires_at: self.expires_display,
        }
    }

    fn clear_hold(&mut self) {
        self.is_held = false;
        self.held_by.clear();
        self.expires_instant = None;
        self.expires_display = None;
    }

    fn arm_hold(&mut self, order_id: &str, ttl: std::time::Duration, ctx: &RuntimeContext, now: Instant) {
        self.is_held = true;
        self.held_by = order_id.to_string();
        self.expires_instant = Some(now + ttl);
        self.expires_display = ChronoDuration::from_std(ttl)
            .ok()
            .map(|d| ctx.time.now() + d);
    }
}

fn is_expired(state: &SeatState, now: Instant) -> bool {
    match state.expires_instant {
        Some(deadline) => now >= deadline,
        None => true,
    }
}

/// Spawns a seat entity task and returns a handle to it. Entities live for
/// the lifetime of the process (there is no explicit teardown — they are
/// "created lazily on first command; lives indefinitely", §3).
pub fn spawn(flight_id: String, seat_id: String, ctx: RuntimeContext) -> SeatHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = SeatHandle { flight_id: flight_id.clone(), seat_id: seat_id.clone(), tx };
    tokio::spawn(run(flight_id, seat_id, ctx, rx));
    handle
}

async fn run(
    flight_id: String,
    seat_id: String,
    ctx: RuntimeContext,
    mut rx: mpsc::UnboundedReceiver<SeatMessage>,
) {
    let mut state = SeatState::default();
    let mut processed: u64 = 0;

    info!(%flight_id, %seat_id, "seat entity started");

    loop {
        let deadline = state.expires_instant;
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
                        info!(%flight_id, %seat_id, "seat entity channel closed, stopping");
                        return;
                    }
                    Some(SeatMessage::Query(reply)) => {
                        let _ = reply.send(state.snapshot());
                    }
                    Some(SeatMessage::Command(cmd)) => {
                        apply(&mut state, &cmd, &ctx, &flight_id, &seat_id);
                        processed += 1;
                        if processed % TRUNCATE_AFTER == 0 {
                            info!(%flight_id, %seat_id, processed, "continuing as new to trim history");
                        }
                    }
                }
            }
            _ = sleep => {
                info!(%flight_id, %seat_id, held_by = %state.held_by, "hold expired, releasing seat");
                state.clear_hold();
            }
        }
    }
}

fn apply(state: &mut SeatState, cmd: &SeatCommand, ctx: &RuntimeContext, flight_id: &str, seat_id: &str) {
    let now = Instant::now();

    match cmd.kind {
        CommandType::Hold => {
            if state.is_confirmed {
                warn!(%flight_id, %seat_id, order_id = %cmd.order_id, "HOLD ignored: seat already confirmed");
                return;
            }
            let held_by_other_active =
                state.is_held && state.held_by != cmd.order_id && !is_expired(state, now);
            if held_by_other_active {
                warn!(%flight_id, %seat_id, order_id = %cmd.order_id, held_by = %state.held_by, "HOLD rejected: held by another order");
                return;
            }
            state.arm_hold(&cmd.order_id, cmd.ttl, ctx, now);
            info!(%flight_id, %seat_id, order_id = %cmd.order_id, "seat is now HELD");
        }
        CommandType::Extend => {
            let held_by_same_active =
                state.is_held && state.held_by == cmd.order_id && !is_expired(state, now);
            if !held_by_same_active {
                warn!(%flight_id, %seat_id, order_id = %cmd.order_id, "EXTEND ignored: no active hold by this order");
                return;
            }
            state.arm_hold(&cmd.order_id, cmd.ttl, ctx, now);
            info!(%flight_id, %seat_id, order_id = %cmd.order_id, "hold extended");
        }
        CommandType::Release => {
            if state.is_held && state.held_by == cmd.order_id {
                state.clear_hold();
                info!(%flight_id, %seat_id, order_id = %cmd.order_id, "seat released");
            } else {
                warn!(%flight_id, %seat_id, order_id = %cmd.order_id, "RELEASE ignored: not held by this order");
            }
        }
        CommandType::Confirm => {
            if state.is_confirmed {
                if state.confirmed_by != cmd.order_id {
                    warn!(%flight_id, %seat_id, order_id = %cmd.order_id, confirmed_by = %state.confirmed_by, "CONFIRM ignored: confirmed by another order");
                }
                // idempotent no-op re-confirm by the same order: nothing changes.
                return;
            }
            if state.is_held && state.held_by == cmd.order_id {
                state.is_confirmed = true;
                state.confirmed_by = cmd.order_id.clone();
                state.clear_hold();
                info!(%flight_id, %seat_id, order_id = %cmd.order_id, "seat PERMANENTLY CONFIRMED");
            } else {
                warn!(%flight_id, %seat_id, order_id = %cmd.order_id, "CONFIRM ignored: not held by this order");
            }
        }
    }
}
