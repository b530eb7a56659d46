use fieldx::fxstruct;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::clock::Clock;
use crate::clock::TokioClock;
use crate::entry::CacheEntry;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Age and freshness of one cached key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    /// Whole seconds since the entry was stored.
    #[serde(rename = "age")]
    pub age_secs: u64,
    pub valid:    bool,
}

/// Time-bounded cache with stale-on-failure fallback.
///
/// Entries are never expired by the cache itself. An entry older than [`ttl`](Self::ttl) is stale: it is not served
/// as a hit, but it is still returned when a refresh fails. Only [`clear()`](Self::clear) removes entries.
///
/// ```ignore
/// let cache = StatCache::builder()
///     .ttl(Duration::from_secs(60))
///     .build()?;
///
/// let value = cache
///     .fetch_with_cache("categories", || async { source.category_stats().await })
///     .await;
/// ```
#[fxstruct(
    sync,
    builder(
        doc("Builder object of [`StatCache`].", "", "See [`StatCache::builder()`] method."),
        method_doc("Implement builder pattern for [`StatCache`]."),
    )
)]
pub struct StatCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// How long an entry stays fresh.
    #[fieldx(get(copy), default(DEFAULT_TTL))]
    ttl: Duration,

    #[fieldx(get(copy), default(64))]
    max_capacity: u64,

    /// Serialize concurrent fetches of the same key so that one producer call serves all of them.
    #[fieldx(get(copy), default(false))]
    coalesce: bool,

    #[fieldx(get(clone), default(TokioClock::shared()))]
    clock: Arc<dyn Clock>,

    /// Cache name. Most useful for debugging and logging.
    #[fieldx(get(copy), default("stats"))]
    name: &'static str,

    #[fieldx(lazy, private, get(clone), builder(off))]
    entries: Arc<Cache<String, CacheEntry<V>>>,

    #[fieldx(lock, private, get_mut, builder(off), default(HashMap::new()))]
    key_locks: HashMap<String, Arc<Mutex<()>>>,
}

impl<V> StatCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn build_entries(&self) -> Arc<Cache<String, CacheEntry<V>>> {
        Arc::new(
            Cache::builder()
                .max_capacity(self.max_capacity())
                .name(self.name())
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        )
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.key_locks_mut()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Return the cached value for `key` if it is fresh, otherwise call `producer` and cache its result.
    ///
    /// When the producer fails, whatever is cached under `key` is returned, fresh or not. `None` means the producer
    /// failed and there was nothing to fall back to. Producer errors are logged and never propagated.
    #[instrument(level = "trace", skip(self, producer), fields(cache = self.name()))]
    pub async fn fetch_with_cache<F, Fut, E>(&self, key: &str, producer: F) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        // Held until the producer result is stored, so a waiting caller sees it as a fresh hit.
        let _inflight = if self.coalesce() {
            Some(self.key_lock(key).lock_owned().await)
        }
        else {
            None
        };

        let entries = self.entries();
        let cached = entries.get(key).await;

        if let Some(entry) = &cached {
            if entry.is_fresh(self.clock().now(), self.ttl()) {
                debug!("[{}] HIT({key})", self.name());
                return Some(entry.data().clone());
            }
        }

        match producer().await {
            Ok(data) => {
                self.store(key, data.clone()).await;
                Some(data)
            }
            Err(err) => {
                // A concurrent caller may have refreshed the key while the producer was running.
                let fallback = entries.get(key).await.or(cached);
                if let Some(entry) = fallback {
                    warn!(
                        "[{}] fetching '{key}' failed, serving data {}s old: {err}",
                        self.name(),
                        entry.age(self.clock().now()).as_secs()
                    );
                    Some(entry.into_data())
                }
                else {
                    warn!("[{}] fetching '{key}' failed, nothing cached: {err}", self.name());
                    None
                }
            }
        }
    }

    /// Put `data` under `key`, stamped with the current time, replacing whatever was there.
    pub async fn store(&self, key: &str, data: V) {
        debug!("[{}] STORE({key})", self.name());
        self.entries()
            .insert(key.to_string(), CacheEntry::new(data, self.clock().now()))
            .await;
    }

    /// The entry stored under `key`, regardless of its age.
    pub async fn peek(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries().get(key).await
    }

    /// Remove every entry. Subsequent fetches go to their producers.
    pub async fn clear(&self) {
        let entries = self.entries();
        entries.invalidate_all();
        entries.run_pending_tasks().await;
        self.key_locks_mut().clear();
        debug!("[{}] cleared", self.name());
    }

    /// Age and freshness of every cached key.
    pub fn status(&self) -> BTreeMap<String, CacheStatus> {
        let now = self.clock().now();
        let ttl = self.ttl();

        self.entries()
            .iter()
            .map(|(key, entry)| {
                (
                    (*key).clone(),
                    CacheStatus {
                        age_secs: entry.age(now).as_secs(),
                        valid:    entry.is_fresh(now, ttl),
                    },
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
