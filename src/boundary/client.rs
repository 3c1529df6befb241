use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::{PlannerError, PlannerResult},
    storage::entities::DayRecord,
    utils::time::DateKey,
};

use super::{service::StoreRequest, PlannerApi};

/// Front-end side of the boundary. Cheap to clone, every clone talks to the same
/// [StoreService](super::service::StoreService).
#[derive(Clone)]
pub struct PlannerClient {
    sender: mpsc::Sender<StoreRequest>,
}

impl PlannerClient {
    pub fn new(sender: mpsc::Sender<StoreRequest>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        request: StoreRequest,
        reply: oneshot::Receiver<std::io::Result<T>>,
    ) -> PlannerResult<std::io::Result<T>> {
        self.sender
            .send(request)
            .await
            .map_err(|_| PlannerError::ServiceClosed)?;
        reply.await.map_err(|_| PlannerError::ServiceClosed)
    }
}

#[async_trait]
impl PlannerApi for PlannerClient {
    async fn get_data(&self, key: &str) -> PlannerResult<DayRecord> {
        let key: DateKey = key.parse()?;
        let (reply, receiver) = oneshot::channel();
        self.request(StoreRequest::GetData { key, reply }, receiver)
            .await?
            .map_err(|source| PlannerError::ReadFailure { key, source })
    }

    async fn save_data(&self, key: &str, record: DayRecord) -> PlannerResult<()> {
        let key: DateKey = key.parse()?;
        record.validate()?;
        let (reply, receiver) = oneshot::channel();
        self.request(StoreRequest::SaveData { key, record, reply }, receiver)
            .await?
            .map_err(|source| PlannerError::WriteFailure { key, source })
    }
}
