use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Minimum hold TTL (§3, §8): callers supplying less get clamped up to this.
pub const MIN_TTL: Duration = Duration::from_secs(1);
/// Hold window used by the order orchestrator for every HOLD/EXTEND it issues.
pub const HOLD_TTL: Duration = Duration::from_secs(15 * 60);
/// Initial (and refreshed-to) payment attempt budget per order.
pub const INITIAL_ATTEMPTS: u32 = 3;

pub fn clamp_ttl(ttl: Duration) -> Duration {
    if ttl < MIN_TTL {
        MIN_TTL
    } else {
        ttl
    }
}

/// The four command types a seat entity accepts (§3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandType {
    Hold,
    Extend,
    Release,
    Confirm,
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandType::Hold => write!(f, "HOLD"),
            CommandType::Extend => write!(f, "EXTEND"),
            CommandType::Release => write!(f, "RELEASE"),
            CommandType::Confirm => write!(f, "CONFIRM"),
        }
    }
}

/// A command sent from an order orchestrator to a seat entity via Command
/// Dispatch. `ttl` only matters for HOLD/EXTEND.
#[derive(Debug, Clone)]
pub struct SeatCommand {
    pub kind: CommandType,
    pub order_id: String,
    pub ttl: Duration,
}

impl SeatCommand {
    pub fn hold(order_id: impl Into<String>, ttl: Duration) -> Self {
        Self { kind: CommandType::Hold, order_id: order_id.into(), ttl: clamp_ttl(ttl) }
    }

    pub fn extend(order_id: impl Into<String>, ttl: Duration) -> Self {
        Self { kind: CommandType::Extend, order_id: order_id.into(), ttl: clamp_ttl(ttl) }
    }

    pub fn release(order_id: impl Into<String>) -> Self {
        Self { kind: CommandType::Release, order_id: order_id.into(), ttl: Duration::ZERO }
    }

    pub fn confirm(order_id: impl Into<String>) -> Self {
        Self { kind: CommandType::Confirm, order_id: order_id.into(), ttl: Duration::ZERO }
    }
}

/// Public projection of a seat's state, returned by `GetState` queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeatSnapshot {
    pub is_held: bool,
    pub is_confirmed: bool,
    pub held_by: String,
    pub confirmed_by: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Category a seat falls into for `SeatAvailability` (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatCategory {
    Available,
    Held,
    Confirmed,
}

/// The order's lifecycle states (§3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderLifecycleState {
    Pending,
    SeatsSelected,
    Confirmed,
    Failed,
    Expired,
}

impl OrderLifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Expired)
    }

    /// States reachable from this one. `SeatsSelected -> SeatsSelected` is
    /// the self-refresh on UpdateSeats/payment-failure-with-attempts-left.
    pub fn valid_transitions(&self) -> &'static [OrderLifecycleState] {
        use OrderLifecycleState::*;
        match self {
            Pending => &[SeatsSelected],
            SeatsSelected => &[SeatsSelected, Confirmed, Failed, Expired],
            Confirmed => &[],
            Failed => &[],
            Expired => &[],
        }
    }

    pub fn can_transition_to(&self, next: &OrderLifecycleState) -> bool {
        self.valid_transitions().contains(next)
    }
}

impl fmt::Display for OrderLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::SeatsSelected => "SEATS_SELECTED",
            Self::Confirmed => "CONFIRMED",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
        };
        write!(f, "{s}")
    }
}

/// Wire shape for `OrderState` (§6): capitalized field names, exactly as
/// spec.md's JSON contract.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStateDto {
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Seats")]
    pub seats: Vec<String>,
    #[serde(rename = "HoldExpiresAt")]
    pub hold_expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "AttemptsLeft")]
    pub attempts_left: u32,
    #[serde(rename = "LastPaymentErr")]
    pub last_payment_err: String,
}

impl OrderStateDto {
    pub fn is_terminal(&self) -> bool {
        matches!(self.state.as_str(), "CONFIRMED" | "FAILED" | "EXPIRED")
    }
}

/// Computes the seat-level diff for an UpdateSeats revision (§4.3 S6):
/// seats to release (present before, absent after) and seats to hold
/// (absent before, present after).
pub fn diff_seats(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    use std::collections::HashSet;
    let old_set: HashSet<&String> = old.iter().collect();
    let new_set: HashSet<&String> = new.iter().collect();

    let to_release = old.iter().filter(|s| !new_set.contains(s)).cloned().collect();
    let to_hold = new.iter().filter(|s| !old_set.contains(s)).cloned().collect();
    (to_release, to_hold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_below_minimum_is_clamped() {
        assert_eq!(clamp_ttl(Duration::from_millis(0)), MIN_TTL);
        assert_eq!(clamp_ttl(Duration::from_millis(500)), MIN_TTL);
        assert_eq!(clamp_ttl(Duration::from_secs(2)), Duration::from_secs(2));
    }

    #[test]
    fn diff_seats_computes_release_and_hold_sets() {
        let old = vec!["5A".to_string(), "5B".to_string()];
        let new = vec!["5A".to_string(), "5C".to_string()];
        let (to_release, to_hold) = diff_seats(&old, &new);
        assert_eq!(to_release, vec!["5B".to_string()]);
        assert_eq!(to_hold, vec!["5C".to_string()]);
    }

    #[test]
    fn diff_seats_identical_lists_produce_no_dispatches() {
        let seats = vec!["1A".to_string(), "2A".to_string()];
        let (to_release, to_hold) = diff_seats(&seats, &seats);
        assert!(to_release.is_empty());
        assert!(to_hold.is_empty());
    }

    #[test]
    fn order_terminal_states_have_no_outgoing_transitions() {
        for s in [
            OrderLifecycleState::Confirmed,
            OrderLifecycleState::Failed,
            OrderLifecycleState::Expired,
        ] {
            assert!(s.is_terminal());
            assert!(s.valid_transitions().is_empty());
        }
    }
}
