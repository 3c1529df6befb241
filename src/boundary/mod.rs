//! Contract between the planner front-end and the store. Only two calls cross it, and both
//! name a day by its `YYYY-MM-DD` key. [service::StoreService] owns the store on one side,
//! [client::PlannerClient] is what the front-end holds on the other.

pub mod client;
pub mod service;

use async_trait::async_trait;

use crate::{error::PlannerResult, storage::entities::DayRecord};

/// Calls the front-end is allowed to make against the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlannerApi: Send + Sync {
    /// Record for the day, or an empty record if the day was never saved.
    async fn get_data(&self, key: &str) -> PlannerResult<DayRecord>;

    /// Replaces the day's record. Resolves once the record is durable.
    async fn save_data(&self, key: &str, record: DayRecord) -> PlannerResult<()>;
}
