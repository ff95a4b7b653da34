// Leaderboard domain
//
// Ranked standings per sport plus the department totals. Standings are
// lazily reconciled against registrations/teams before every read, and
// score/position mutation is frozen once a sport is finalized.

pub mod engine;
pub mod models;
pub mod routes;

pub use engine::{points_for, AdjustAction};
pub use models::SportResult;
