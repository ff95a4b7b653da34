// Infrastructure pieces shared by the domains

pub mod count_feed;
pub mod lock;
pub mod seat_cache;

pub use count_feed::CountFeed;
pub use seat_cache::SeatCache;
