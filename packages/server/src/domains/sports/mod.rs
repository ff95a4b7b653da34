// Sports domain
//
// Sport catalogue plus the registration/team operations that carry the
// exclusivity rules: one registration per (student, sport), one team per
// student per sport, and team membership and individual registration for
// the same sport are mutually exclusive.

pub mod models;
pub mod routes;

pub use models::{Registration, Sport, Team};
