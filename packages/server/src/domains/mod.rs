// Business domains
pub mod auth;
pub mod booking;
pub mod leaderboard;
pub mod sports;
