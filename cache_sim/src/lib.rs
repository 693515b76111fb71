pub mod addr;
mod bin;
pub mod cache;
pub mod config;
pub mod recency;
pub mod sim;
pub mod stat;
pub mod trace;
