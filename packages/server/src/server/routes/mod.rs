// HTTP routes shared by the whole app (domain routes live in their domains)
pub mod health;

pub use health::*;
