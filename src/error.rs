//! Errors that cross the boundary between the planner front-end and the store.

use std::io;

use thiserror::Error;

use crate::utils::time::DateKey;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("malformed date key {0:?}, expected YYYY-MM-DD")]
    MalformedKey(String),

    #[error("{what} {value} is out of range, expected {min}..={max}")]
    OutOfRange {
        what: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },

    #[error("failed to read data for {key}")]
    ReadFailure {
        key: DateKey,
        #[source]
        source: io::Error,
    },

    #[error("failed to save data for {key}")]
    WriteFailure {
        key: DateKey,
        #[source]
        source: io::Error,
    },

    #[error("store service is not running")]
    ServiceClosed,
}

pub type PlannerResult<T> = Result<T, PlannerError>;
