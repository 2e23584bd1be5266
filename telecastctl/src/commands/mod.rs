pub mod cache;
pub mod channel;
pub mod plan;
pub mod schedule;
