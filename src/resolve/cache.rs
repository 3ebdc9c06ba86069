//! Process-wide unit cache with deduplicated in-flight loads.
//!
//! One [UnitCache] is created per application session and shared through `Arc`. Every
//! load runs on its own tokio task, so a caller dropping its future never cancels the
//! fetch; the result still lands in the cache. Concurrent callers for the same key join
//! the same shared future. Failures are returned to every waiter but not cached.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::QuartermasterConfig;
use crate::data::refs::CacheKey;
use crate::data::source::{FactionDataSource, FileFactionSource};
use crate::data::unit::{FactionIndex, Unit};
use crate::error::{ResolveError, Result};

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Flight<V> {
    Ready(V),
    Joined(SharedLoad<V>),
    Started(SharedLoad<V>),
}

/// Settled values plus at most one in-flight load per key.
struct SingleFlight<K, V> {
    settled: RwLock<HashMap<K, V>>,
    pending: Mutex<HashMap<K, SharedLoad<V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn new() -> Arc<Self> {
        Arc::new(Self {
            settled: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        })
    }

    fn get(&self, key: &K) -> Option<V> {
        self.settled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn insert(&self, key: K, value: V) {
        self.settled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    fn len(&self) -> usize {
        self.settled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn is_pending(&self, key: &K) -> bool {
        lock(&self.pending).contains_key(key)
    }

    fn load<F, Fut>(self: &Arc<Self>, key: &K, start: F) -> Flight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Some(value) = self.get(key) {
            return Flight::Ready(value);
        }

        let mut pending = lock(&self.pending);
        if let Some(shared) = pending.get(key) {
            return Flight::Joined(shared.clone());
        }
        // A load may have settled between the first lookup and taking the pending lock.
        if let Some(value) = self.get(key) {
            return Flight::Ready(value);
        }

        let load = start();
        let flight = Arc::clone(self);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = load.await;
            // Settle before clearing pending so a concurrent caller always sees one of them.
            if let Ok(value) = &result {
                flight.insert(task_key.clone(), value.clone());
            }
            lock(&flight.pending).remove(&task_key);
            result
        });

        let flight = Arc::clone(self);
        let join_key = key.clone();
        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => {
                    lock(&flight.pending).remove(&join_key);
                    Err(ResolveError::transient(join_key.to_string(), err))
                }
            }
        }
        .boxed()
        .shared();

        pending.insert(key.clone(), shared.clone());
        Flight::Started(shared)
    }
}

impl<V> Flight<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn into_future(self) -> BoxFuture<'static, Result<V>> {
        match self {
            Self::Ready(value) => futures_util::future::ready(Ok(value)).boxed(),
            Self::Joined(shared) | Self::Started(shared) => shared.boxed(),
        }
    }
}

pub struct UnitCache {
    source: Arc<dyn FactionDataSource>,
    units: Arc<SingleFlight<CacheKey, Arc<Unit>>>,
    indices: Arc<SingleFlight<String, Arc<FactionIndex>>>,
    permits: Arc<Semaphore>,
    fetches_started: AtomicUsize,
}

impl std::fmt::Debug for UnitCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitCache")
            .field("units", &self.units.len())
            .field("indices", &self.indices.len())
            .field("fetches_started", &self.fetch_count())
            .finish()
    }
}

impl UnitCache {
    pub fn new(source: Arc<dyn FactionDataSource>) -> Arc<Self> {
        Self::with_fetch_limit(source, QuartermasterConfig::default().max_concurrent_fetches)
    }

    pub fn with_fetch_limit(
        source: Arc<dyn FactionDataSource>,
        max_concurrent_fetches: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            units: SingleFlight::new(),
            indices: SingleFlight::new(),
            permits: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
            fetches_started: AtomicUsize::new(0),
        })
    }

    /// Cache over the on-disk faction tree named by `config`.
    pub fn from_config(config: &QuartermasterConfig) -> Arc<Self> {
        let source = Arc::new(FileFactionSource::new(config.data_dir.clone()));
        Self::with_fetch_limit(source, config.max_concurrent_fetches)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Unit>> {
        self.units.get(key)
    }

    /// Seeds the cache with an already resolved record.
    pub fn insert(&self, key: CacheKey, unit: Unit) -> Arc<Unit> {
        let unit = Arc::new(unit);
        self.units.insert(key, Arc::clone(&unit));
        unit
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.units.is_pending(key)
    }

    /// Number of underlying unit fetches started against the source.
    pub fn fetch_count(&self) -> usize {
        self.fetches_started.load(Ordering::SeqCst)
    }

    /// Resolves `key`, joining an in-flight fetch when there is one. Must be called from
    /// within a tokio runtime.
    pub fn fetch(&self, key: &CacheKey) -> BoxFuture<'static, Result<Arc<Unit>>> {
        let flight = self.units.load(key, || {
            self.fetches_started.fetch_add(1, Ordering::SeqCst);
            let source = Arc::clone(&self.source);
            let permits = Arc::clone(&self.permits);
            let key = key.clone();
            async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|err| ResolveError::transient(key.to_string(), err))?;
                debug!("fetching unit {key}");
                match source.fetch_unit(&key).await {
                    Ok(unit) => Ok(Arc::new(unit)),
                    Err(err) => {
                        warn!("fetch of {key} failed: {err}");
                        Err(err)
                    }
                }
            }
        });
        match &flight {
            Flight::Ready(_) => debug!("cache hit {key}"),
            Flight::Joined(_) => debug!("joined in-flight fetch {key}"),
            Flight::Started(_) => {}
        }
        flight.into_future()
    }

    /// Lazily loads a faction listing. Per-faction failures are returned, not cached.
    pub fn list_units(&self, faction_id: &str) -> BoxFuture<'static, Result<Arc<FactionIndex>>> {
        let faction = faction_id.to_string();
        self.indices
            .load(&faction, || {
                let source = Arc::clone(&self.source);
                let faction = faction.clone();
                async move {
                    debug!("listing units of faction {faction}");
                    source.list_units(&faction).await.map(Arc::new)
                }
            })
            .into_future()
    }
}
