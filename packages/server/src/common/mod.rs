// Shared types used across domains

pub mod student;

pub use student::Student;

/// Year tags used across bookings and registrations.
pub const YEARS: [&str; 4] = ["FE", "SE", "TE", "BE"];

/// Department branches participating in the fest.
pub const BRANCHES: [&str; 6] = ["COMPS", "IT", "AIML", "DS", "MECH", "CIVIL"];
