//! Daily and hourly planner. Every day is kept as a single record keyed by its local
//! `YYYY-MM-DD` date. The front-end works against a [cache::DayCache], which talks to the store
//! only through the two calls of [boundary::PlannerApi].
//!

pub mod boundary;
pub mod cache;
pub mod cli;
pub mod error;
pub mod storage;
pub mod utils;
