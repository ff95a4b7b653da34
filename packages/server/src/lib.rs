// OJUS Fest Platform - API Core
//
// Backend for the college fest: seat booking against a fixed-capacity pool,
// sport/event registrations with exclusivity rules, and the ranked
// leaderboard with department points.
//
// Domains own their models, engine logic and routes; kernel holds the
// infrastructure pieces (seat cache, realtime fanout, advisory lock).

pub mod common;
pub mod config;
pub mod domains;
pub mod error;
pub mod kernel;
pub mod server;

pub use config::*;
pub use error::ApiError;
