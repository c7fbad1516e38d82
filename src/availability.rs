use crate::model::SeatCategory;
use crate::seat::SeatRegistry;
use serde::Serialize;

const ROWS: std::ops::RangeInclusive<u8> = 1..=5;
const COLS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

/// The fixed 30-seat coordinate space (§4.4, §6): rows 1-5 x cols A-F.
/// Configuration, not algorithm — nothing downstream depends on its size.
pub fn all_seats() -> Vec<String> {
    let mut seats = Vec::with_capacity(30);
    for row in ROWS {
        for col in COLS {
            seats.push(format!("{row}{col}"));
        }
    }
    seats
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatAvailability {
    #[serde(rename = "flightID")]
    pub flight_id: String,
    pub available: Vec<String>,
    pub held: Vec<String>,
    pub confirmed: Vec<String>,
    pub total: usize,
}

/// Computes `SeatAvailability` by querying each seat in the coordinate
/// space. Seats with no entity (never touched) or whose query fails are
/// classified `available` (§4.4).
pub async fn compute(seats_registry: &SeatRegistry, flight_id: &str) -> SeatAvailability {
    let all = all_seats();
    let mut available = Vec::new();
    let mut held = Vec::new();
    let mut confirmed = Vec::new();

    for seat_id in &all {
        match seats_registry.query(flight_id, seat_id).await {
            None => available.push(seat_id.clone()),
            Some(snap) => match classify(&snap) {
                SeatCategory::Available => available.push(seat_id.clone()),
                SeatCategory::Held => held.push(seat_id.clone()),
                SeatCategory::Confirmed => confirmed.push(seat_id.clone()),
            },
        }
    }

    SeatAvailability { flight_id: flight_id.to_string(), available, held, confirmed, total: all.len() }
}

fn classify(snap: &crate::model::SeatSnapshot) -> SeatCategory {
    if snap.is_confirmed {
        SeatCategory::Confirmed
    } else if snap.is_held {
        SeatCategory::Held
    } else {
        SeatCategory::Available
    }
}
