use std::{
    future::Future,
    io::{self, ErrorKind},
    ops::Deref,
    path::{Path, PathBuf},
};

use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{debug, info, warn};

use crate::utils::time::DateKey;

use super::{
    document::{DocumentShape, StoreDocument},
    entities::DayRecord,
};

/// Interface for abstracting storage of day records.
pub trait RecordStorage {
    /// Retrieves the record for a day. A day that was never written is returned as
    /// [DayRecord::default], that is not an error.
    fn get(&self, key: &DateKey) -> impl Future<Output = io::Result<DayRecord>> + Send;

    /// Replaces the whole record of a day. Once this resolves successfully the record is durable.
    fn put(&self, key: &DateKey, record: DayRecord) -> impl Future<Output = io::Result<()>> + Send;
}

impl<T: Deref + Sync> RecordStorage for T
where
    T::Target: RecordStorage + Sync,
{
    fn get(&self, key: &DateKey) -> impl Future<Output = io::Result<DayRecord>> + Send {
        self.deref().get(key)
    }

    fn put(&self, key: &DateKey, record: DayRecord) -> impl Future<Output = io::Result<()>> + Send {
        self.deref().put(key, record)
    }
}

pub const STORE_FILE_NAME: &str = "db.json";

enum LoadState {
    Missing,
    Loaded(DocumentShape),
    Corrupt,
    // The file is there but couldn't be read, its contents are unknown.
    Unreadable(io::Error),
}

/// The main realization of [RecordStorage]. Every day lives in a single json file which is read
/// in full on every access and rewritten in full on every change.
pub struct JsonFileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    guard: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(store_dir: PathBuf) -> Result<Self, io::Error> {
        std::fs::create_dir_all(&store_dir)?;

        Ok(Self {
            path: store_dir.join(STORE_FILE_NAME),
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, extension: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }

    async fn open_lock(&self) -> io::Result<File> {
        File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.sibling("lock"))
            .await
    }

    /// Reads the whole store. Never fails, anything unreadable is an empty store and the returned
    /// state tells why.
    async fn load(&self) -> (StoreDocument, LoadState) {
        debug!("Loading {:?}", self.path);
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return (StoreDocument::default(), LoadState::Missing);
            }
            Err(e) => {
                warn!("Couldn't read store {:?}, treating it as empty: {e}", self.path);
                return (StoreDocument::default(), LoadState::Unreadable(e));
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                let (document, shape) = StoreDocument::from_value(value);
                (document, LoadState::Loaded(shape))
            }
            Err(e) => {
                warn!("Store {:?} is corrupted, treating it as empty: {e}", self.path);
                (StoreDocument::default(), LoadState::Corrupt)
            }
        }
    }

    /// Writes into a temporary file first and then swaps it with the store, so a failure at any
    /// point leaves the previous store intact.
    async fn write(&self, document: &StoreDocument) -> io::Result<()> {
        let temporary = self.sibling("tmp");
        let result = async {
            let buffer = serde_json::to_vec_pretty(document)?;
            let mut file = File::create(&temporary).await?;
            file.write_all(&buffer).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temporary, &self.path).await
        }
        .await;

        if result.is_err() {
            if let Err(e) = fs::remove_file(&temporary).await {
                debug!("Couldn't clean up {temporary:?}: {e}");
            }
        }
        result
    }

    /// First free `db.json.corrupt`, `db.json.corrupt.1`, ... name. Earlier backups are never
    /// replaced.
    async fn backup_path(&self) -> io::Result<PathBuf> {
        let first = self.sibling("corrupt");
        let mut candidate = first.clone();
        for attempt in 1.. {
            if !fs::try_exists(&candidate).await? {
                break;
            }
            let mut name = first.as_os_str().to_owned();
            name.push(format!(".{attempt}"));
            candidate = PathBuf::from(name);
        }
        Ok(candidate)
    }

    async fn preserve(&self) -> io::Result<()> {
        let backup = self.backup_path().await?;
        warn!("Moving unusable store to {backup:?}");
        fs::rename(&self.path, &backup).await
    }

    async fn get_inner(&self, key: &DateKey) -> io::Result<DayRecord> {
        let (document, _) = self.load().await;
        Ok(document.get(key).cloned().unwrap_or_default())
    }

    async fn put_inner(&self, key: &DateKey, record: DayRecord) -> io::Result<()> {
        let (mut document, state) = self.load().await;

        match state {
            // Overwriting a file nobody could read would lose whatever is in it.
            LoadState::Unreadable(e) => return Err(e),
            LoadState::Corrupt | LoadState::Loaded(DocumentShape::Unknown) => {
                self.preserve().await?;
            }
            LoadState::Loaded(DocumentShape::LegacyTasks) => {
                info!("Rewriting legacy store in the current format");
            }
            LoadState::Missing | LoadState::Loaded(DocumentShape::Current) => {}
        }

        document.insert(key, record);
        self.write(&document).await?;
        debug!("Saved {key} into {:?}", self.path);
        Ok(())
    }
}

impl RecordStorage for JsonFileStorage {
    async fn get(&self, key: &DateKey) -> io::Result<DayRecord> {
        let _guard = self.guard.lock().await;
        let lock = self.open_lock().await?;
        lock.lock_shared()?;
        let result = self.get_inner(key).await;
        release(lock).await;
        result
    }

    async fn put(&self, key: &DateKey, record: DayRecord) -> io::Result<()> {
        let _guard = self.guard.lock().await;
        // Semi-safe acquire-release for the store
        let lock = self.open_lock().await?;
        lock.lock_exclusive()?;
        let result = self.put_inner(key, record).await;
        // The outcome of the write stands either way, closing the file releases the lock too.
        release(lock).await;
        result
    }
}

async fn release(lock: File) {
    if let Err(e) = lock.unlock_async().await {
        warn!("Couldn't release store lock: {e}");
    }
}
