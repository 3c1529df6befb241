use std::io;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::{
    storage::{entities::DayRecord, record_storage::RecordStorage},
    utils::time::DateKey,
};

use super::client::PlannerClient;

const REQUEST_BUFFER: usize = 16;

#[derive(Debug)]
pub enum StoreRequest {
    GetData {
        key: DateKey,
        reply: oneshot::Sender<io::Result<DayRecord>>,
    },
    SaveData {
        key: DateKey,
        record: DayRecord,
        reply: oneshot::Sender<io::Result<()>>,
    },
}

/// Owns the storage and answers requests strictly one at a time, so reads and writes of the
/// store file never interleave.
pub struct StoreService<S> {
    receiver: mpsc::Receiver<StoreRequest>,
    storage: S,
}

impl<S: RecordStorage> StoreService<S> {
    pub fn new(receiver: mpsc::Receiver<StoreRequest>, storage: S) -> Self {
        Self { receiver, storage }
    }

    /// Runs until every [PlannerClient] is dropped.
    pub async fn run(mut self) {
        while let Some(request) = self.receiver.recv().await {
            match request {
                StoreRequest::GetData { key, reply } => {
                    debug!("Processing get for {key}");
                    let result = self.storage.get(&key).await;
                    if let Err(e) = &result {
                        error!("Error reading {key}: {e:?}");
                    }
                    if reply.send(result).is_err() {
                        debug!("Requester for {key} went away");
                    }
                }
                StoreRequest::SaveData { key, record, reply } => {
                    debug!("Processing save for {key}");
                    let result = self.storage.put(&key, record).await;
                    match &result {
                        Ok(_) => info!("Saved {key}"),
                        Err(e) => error!("Error saving {key}: {e:?}"),
                    }
                    if reply.send(result).is_err() {
                        debug!("Requester for {key} went away");
                    }
                }
            }
        }
        self.receiver.close();
        debug!("Store service stopped");
    }
}

/// Starts a [StoreService] on the current runtime and returns a handle to talk to it.
pub fn spawn_store_service<S>(storage: S) -> (PlannerClient, JoinHandle<()>)
where
    S: RecordStorage + Send + Sync + 'static,
{
    let (sender, receiver) = mpsc::channel(REQUEST_BUFFER);
    let service = StoreService::new(receiver, storage);
    let handle = tokio::spawn(service.run());
    (PlannerClient::new(sender), handle)
}
