pub mod entity;
pub mod registry;

pub use entity::{spawn, SeatHandle};
pub use registry::SeatRegistry;

/// Durable entity key (§3, §6): `seat::<flightID>::<seatID>`.
pub fn seat_key(flight_id: &str, seat_id: &str) -> String {
    format!("seat::{flight_id}::{seat_id}")
}
