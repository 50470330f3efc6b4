pub mod auth;
pub mod counters;
pub mod feed;
pub mod interactions;
pub mod rate_limiter;
