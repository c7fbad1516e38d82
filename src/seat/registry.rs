use super::entity::{self, SeatHandle};
use super::seat_key;
use crate::context::RuntimeContext;
use crate::errors::DispatchError;
use crate::model::{SeatCommand, SeatSnapshot};
use crate::retry::{retry_with_backoff, RetryPolicy};
use dashmap::DashMap;
use std::time::Duration;
use tracing::warn;

/// Per-attempt budget for a single dispatch try (§5: `StartToClose = 10s`).
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Registry of live seat entity tasks, keyed by `seat::<flightID>::<seatID>`.
/// Mirrors Command Dispatch's "create-or-signal" semantics (§3, §4.2): a
/// command always finds or spawns its target entity; a query never spawns
/// one, so seats nobody has touched yet correctly read as available.
pub struct SeatRegistry {
    entities: DashMap<String, SeatHandle>,
    ctx: RuntimeContext,
}

impl SeatRegistry {
    pub fn new(ctx: RuntimeContext) -> Self {
        Self { entities: DashMap::new(), ctx }
    }

    fn get_or_spawn(&self, flight_id: &str, seat_id: &str) -> SeatHandle {
        let key = seat_key(flight_id, seat_id);
        if let Some(handle) = self.entities.get(&key) {
            return handle.clone();
        }
        self.entities
            .entry(key)
            .or_insert_with(|| entity::spawn(flight_id.to_string(), seat_id.to_string(), self.ctx.clone()))
            .clone()
    }

    /// Read-only lookup used by availability queries (§4.4): does not
    /// create an entity, so an untouched seat is reported as available
    /// rather than spuriously HELD.
    pub fn get(&self, flight_id: &str, seat_id: &str) -> Option<SeatHandle> {
        self.entities.get(&seat_key(flight_id, seat_id)).map(|h| h.clone())
    }

    pub async fn query(&self, flight_id: &str, seat_id: &str) -> Option<SeatSnapshot> {
        match self.get(flight_id, seat_id) {
            Some(handle) => handle.query().await.ok(),
            None => None,
        }
    }

    /// Dispatches a single command to a seat entity with Command Dispatch's
    /// retry policy and an overall deadline (§4.2, §5). The entity is
    /// created lazily if this is its first command.
    pub async fn dispatch(
        &self,
        flight_id: &str,
        seat_id: &str,
        cmd: SeatCommand,
        deadline: Duration,
    ) -> Result<(), DispatchError> {
        let handle = self.get_or_spawn(flight_id, seat_id);
        let policy = RetryPolicy::dispatch();

        let attempt = retry_with_backoff(&policy, || {
            let handle = handle.clone();
            let cmd = cmd.clone();
            async move {
                match tokio::time::timeout(ATTEMPT_TIMEOUT, async { handle.send_command(cmd) }).await {
                    Ok(result) => result,
                    Err(_) => Err(DispatchError::DeadlineExceeded),
                }
            }
        });

        match tokio::time::timeout(deadline, attempt).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(%flight_id, %seat_id, error = %e, "dispatch retries exhausted");
                Err(DispatchError::RetriesExhausted)
            }
            Err(_) => {
                warn!(%flight_id, %seat_id, "dispatch exceeded overall deadline");
                Err(DispatchError::DeadlineExceeded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SeatCommand;

    #[tokio::test]
    async fn unqueried_seat_is_not_created_by_a_read() {
        let reg = SeatRegistry::new(RuntimeContext::new_system());
        assert!(reg.get("F1", "1A").is_none());
        assert!(reg.query("F1", "1A").await.is_none());
    }

    #[tokio::test]
    async fn dispatch_creates_entity_lazily_and_applies_command() {
        let reg = SeatRegistry::new(RuntimeContext::new_system());
        reg.dispatch("F1", "1A", SeatCommand::hold("O1", Duration::from_secs(60)), Duration::from_secs(2))
            .await
            .unwrap();

        let snap = reg.query("F1", "1A").await.unwrap();
        assert!(snap.is_held);
        assert_eq!(snap.held_by, "O1");
    }

    #[tokio::test]
    async fn repeated_dispatch_reuses_the_same_entity() {
        let reg = SeatRegistry::new(RuntimeContext::new_system());
        reg.dispatch("F1", "2A", SeatCommand::hold("O1", Duration::from_secs(60)), Duration::from_secs(2))
            .await
            .unwrap();
        reg.dispatch("F1", "2A", SeatCommand::release("O1"), Duration::from_secs(2))
            .await
            .unwrap();

        let snap = reg.query("F1", "2A").await.unwrap();
        assert!(!snap.is_held);
    }
}
