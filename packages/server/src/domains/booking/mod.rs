// Seat booking domain
//
// A single 1200-seat pool shared by every student. All writes serialize
// through the booking advisory lock; reads go through the seat cache.

pub mod engine;
pub mod models;
pub mod routes;

pub use engine::{BookingEngine, TOTAL_CAPACITY};
pub use models::Booking;
