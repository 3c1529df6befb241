//! In-memory view of the days the front-end has looked at. It is the single place the front-end
//! reads days from and writes edits into, the store only ever sees whole records coming out of it.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use futures::future::join_all;
use tokio::{
    sync::{Mutex, OnceCell, RwLock},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    boundary::PlannerApi,
    error::{PlannerError, PlannerResult},
    storage::entities::DayRecord,
    utils::time::DateKey,
};

type Slot = Arc<OnceCell<RwLock<DayRecord>>>;

struct CacheInner {
    api: Arc<dyn PlannerApi>,
    entries: Mutex<HashMap<DateKey, Slot>>,
    unsaved: Mutex<BTreeSet<DateKey>>,
}

/// Entries are never evicted. Each entry is loaded at most once, concurrent requests for a day
/// that is still loading wait for that load instead of issuing their own.
#[derive(Clone)]
pub struct DayCache {
    inner: Arc<CacheInner>,
}

impl DayCache {
    pub fn new(api: Arc<dyn PlannerApi>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                api,
                entries: Mutex::new(HashMap::new()),
                unsaved: Mutex::new(BTreeSet::new()),
            }),
        }
    }

    async fn slot(&self, key: &DateKey) -> Slot {
        self.inner
            .entries
            .lock()
            .await
            .entry(*key)
            .or_default()
            .clone()
    }

    async fn load<'a>(
        &self,
        key: &DateKey,
        slot: &'a Slot,
    ) -> PlannerResult<&'a RwLock<DayRecord>> {
        slot.get_or_try_init(|| async {
            debug!("Loading {key} into cache");
            let record = self.inner.api.get_data(&key.to_string()).await?;
            Ok::<_, PlannerError>(RwLock::new(record))
        })
        .await
    }

    /// Day as currently held by the cache, loading it through the boundary on first access.
    pub async fn fetch(&self, key: &DateKey) -> PlannerResult<DayRecord> {
        let slot = self.slot(key).await;
        let record = self.load(key, &slot).await?;
        let snapshot = record.read().await.clone();
        Ok(snapshot)
    }

    /// Applies `edit` to the cached day and saves the whole day. A failing edit, or one that
    /// leaves the day in a shape the store can't keep, changes nothing.
    ///
    /// When saving fails the edit is still kept in memory and the day is remembered as unsaved
    /// until [DayCache::flush] succeeds for it.
    pub async fn update<F, R>(&self, key: &DateKey, edit: F) -> PlannerResult<R>
    where
        F: FnOnce(&mut DayRecord) -> PlannerResult<R>,
    {
        let slot = self.slot(key).await;
        let record = self.load(key, &slot).await?;

        // The lock is held through the save so that saves of one day go out in edit order.
        let mut record = record.write().await;
        let mut draft = record.clone();
        let value = edit(&mut draft)?;
        draft.validate()?;
        *record = draft;
        self.save(key, record.clone()).await?;
        Ok(value)
    }

    async fn save(&self, key: &DateKey, record: DayRecord) -> PlannerResult<()> {
        match self.inner.api.save_data(&key.to_string(), record).await {
            Ok(()) => {
                self.inner.unsaved.lock().await.remove(key);
                Ok(())
            }
            Err(e) => {
                warn!("Edit of {key} is kept in memory only: {e}");
                self.inner.unsaved.lock().await.insert(*key);
                Err(e)
            }
        }
    }

    /// Days whose latest edit didn't reach the store.
    pub async fn unsaved(&self) -> Vec<DateKey> {
        self.inner.unsaved.lock().await.iter().copied().collect()
    }

    /// Retries saving every unsaved day. Returns the first failure, after trying all of them.
    pub async fn flush(&self) -> PlannerResult<()> {
        let mut first_error = None;
        for key in self.unsaved().await {
            let slot = self.slot(&key).await;
            let Some(record) = slot.get() else {
                continue;
            };
            let record = record.write().await;
            if let Err(e) = self.save(&key, record.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Loads the days before and after `key` in the background, skipping those already cached.
    /// Failures are only logged, the day will simply be loaded again when it's requested.
    pub fn prefetch(&self, key: &DateKey) -> JoinHandle<()> {
        let cache = self.clone();
        let neighbours = [key.previous(), key.next()];
        tokio::spawn(async move {
            let loads = neighbours.into_iter().flatten().map(|neighbour| {
                let cache = &cache;
                async move {
                    if cache.contains(&neighbour).await {
                        return;
                    }
                    if let Err(e) = cache.fetch(&neighbour).await {
                        warn!("Failed to prefetch {neighbour}: {e}");
                    }
                }
            });
            join_all(loads).await;
        })
    }

    /// Whether the day is loaded. Days that are still loading are not counted.
    pub async fn contains(&self, key: &DateKey) -> bool {
        self.inner
            .entries
            .lock()
            .await
            .get(key)
            .is_some_and(|v| v.initialized())
    }

    /// Number of loaded days.
    pub async fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .await
            .values()
            .filter(|v| v.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        io,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use anyhow::Result;
    use async_trait::async_trait;
    use mockall::predicate::eq;

    use crate::{
        boundary::{MockPlannerApi, PlannerApi},
        error::{PlannerError, PlannerResult},
        storage::entities::DayRecord,
        utils::{logging::TEST_LOGGING, time::DateKey},
    };

    use super::DayCache;

    fn key(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    /// Slow in-memory api that counts how often each day was read.
    #[derive(Default)]
    struct CountingApi {
        reads: std::sync::Mutex<HashMap<String, usize>>,
        saved: std::sync::Mutex<HashMap<String, DayRecord>>,
        fail_saves: AtomicBool,
    }

    impl CountingApi {
        fn reads(&self, key: &str) -> usize {
            self.reads.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl PlannerApi for CountingApi {
        async fn get_data(&self, key: &str) -> PlannerResult<DayRecord> {
            *self.reads.lock().unwrap().entry(key.to_string()).or_default() += 1;
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(self.saved.lock().unwrap().get(key).cloned().unwrap_or_default())
        }

        async fn save_data(&self, key: &str, record: DayRecord) -> PlannerResult<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(PlannerError::WriteFailure {
                    key: key.parse()?,
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                });
            }
            self.saved.lock().unwrap().insert(key.to_string(), record);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fetch_loads_once() -> Result<()> {
        *TEST_LOGGING;
        let mut api = MockPlannerApi::new();
        api.expect_get_data()
            .with(eq("2024-03-10"))
            .times(1)
            .returning(|_| Ok(DayRecord::default()));
        let cache = DayCache::new(Arc::new(api));

        assert!(cache.fetch(&key("2024-03-10")).await?.is_empty());
        assert!(cache.fetch(&key("2024-03-10")).await?.is_empty());
        assert_eq!(cache.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_prefetch_twice_reads_each_neighbour_once() -> Result<()> {
        let mut api = MockPlannerApi::new();
        api.expect_get_data()
            .with(eq("2024-03-09"))
            .times(1)
            .returning(|_| Ok(DayRecord::default()));
        api.expect_get_data()
            .with(eq("2024-03-11"))
            .times(1)
            .returning(|_| Ok(DayRecord::default()));
        let cache = DayCache::new(Arc::new(api));

        cache.prefetch(&key("2024-03-10")).await?;
        cache.prefetch(&key("2024-03-10")).await?;

        assert!(cache.contains(&key("2024-03-09")).await);
        assert!(cache.contains(&key("2024-03-11")).await);
        assert!(!cache.contains(&key("2024-03-10")).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_prefetch_crosses_month_boundary() -> Result<()> {
        let api = Arc::new(CountingApi::default());
        let cache = DayCache::new(api.clone());

        cache.prefetch(&key("2024-03-31")).await?;

        assert_eq!(api.reads("2024-03-30"), 1);
        assert_eq!(api.reads("2024-04-01"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_waits_for_inflight_prefetch() -> Result<()> {
        let api = Arc::new(CountingApi::default());
        let cache = DayCache::new(api.clone());

        let prefetch = cache.prefetch(&key("2024-03-10"));
        // Let the prefetch start its reads before asking for the same day.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let next = cache.fetch(&key("2024-03-11")).await?;
        prefetch.await?;

        assert!(next.is_empty());
        assert_eq!(api.reads("2024-03-11"), 1);
        assert_eq!(api.reads("2024-03-09"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_read() -> Result<()> {
        let api = Arc::new(CountingApi::default());
        let cache = DayCache::new(api.clone());

        let (k1, k2) = (key("2024-03-10"), key("2024-03-10"));
        let (a, b) = tokio::join!(cache.fetch(&k1), cache.fetch(&k2));

        assert_eq!(a?, b?);
        assert_eq!(api.reads("2024-03-10"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_saves_whole_record() -> Result<()> {
        let api = Arc::new(CountingApi::default());
        let cache = DayCache::new(api.clone());

        cache
            .update(&key("2024-03-10"), |day| day.set_task(9, "standup"))
            .await?;
        let done = cache
            .update(&key("2024-03-10"), |day| day.toggle_water(3))
            .await?;

        assert!(done);
        let saved = api.saved.lock().unwrap()["2024-03-10"].clone();
        assert_eq!(saved.task(9), "standup");
        assert_eq!(saved.water_count(), 1);
        assert_eq!(cache.fetch(&key("2024-03-10")).await?, saved);
        assert_eq!(api.reads("2024-03-10"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_edit_is_not_saved() -> Result<()> {
        let mut api = MockPlannerApi::new();
        api.expect_get_data().returning(|_| Ok(DayRecord::default()));
        api.expect_save_data().never();
        let cache = DayCache::new(Arc::new(api));

        let result = cache
            .update(&key("2024-03-10"), |day| day.set_task(2, "too early"))
            .await;

        assert!(matches!(result, Err(PlannerError::OutOfRange { .. })));
        assert!(cache.fetch(&key("2024-03-10")).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_outside_planner_hours_is_rejected() -> Result<()> {
        let mut api = MockPlannerApi::new();
        api.expect_get_data().returning(|_| Ok(DayRecord::default()));
        api.expect_save_data().never();
        let cache = DayCache::new(Arc::new(api));

        let result = cache
            .update(&key("2024-03-10"), |day| {
                day.set_notes("kept only if the whole edit is");
                day.tasks.insert(23, "late".into());
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(PlannerError::OutOfRange { value: 23, .. })));
        assert!(cache.fetch(&key("2024-03-10")).await?.is_empty());
        assert!(cache.unsaved().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_save_keeps_edit_and_flush_retries() -> Result<()> {
        let api = Arc::new(CountingApi::default());
        api.fail_saves.store(true, Ordering::SeqCst);
        let cache = DayCache::new(api.clone());

        let result = cache
            .update(&key("2024-03-10"), |day| {
                day.set_notes("don't lose me");
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(PlannerError::WriteFailure { .. })));
        assert_eq!(cache.fetch(&key("2024-03-10")).await?.notes, "don't lose me");
        assert_eq!(cache.unsaved().await, vec![key("2024-03-10")]);
        assert!(cache.flush().await.is_err());

        api.fail_saves.store(false, Ordering::SeqCst);
        cache.flush().await?;

        assert!(cache.unsaved().await.is_empty());
        assert_eq!(api.saved.lock().unwrap()["2024-03-10"].notes, "don't lose me");
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_read_is_retried() -> Result<()> {
        let mut api = MockPlannerApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_get_data()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(PlannerError::ServiceClosed));
        api.expect_get_data()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(DayRecord::default()));
        let cache = DayCache::new(Arc::new(api));

        assert!(cache.fetch(&key("2024-03-10")).await.is_err());
        assert_eq!(cache.len().await, 0);
        assert!(cache.fetch(&key("2024-03-10")).await.is_ok());
        assert_eq!(cache.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_fresh_caches_are_independent() -> Result<()> {
        let api = Arc::new(CountingApi::default());
        let first = DayCache::new(api.clone());
        let second = DayCache::new(api.clone());

        first
            .update(&key("2024-03-10"), |day| day.set_goal(0, "focus"))
            .await?;

        assert!(first.contains(&key("2024-03-10")).await);
        assert!(!second.contains(&key("2024-03-10")).await);
        Ok(())
    }
}
