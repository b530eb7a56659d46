use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use fieldx::fxstruct;
use futures::future::join_all;
use futures::Stream;
use strum::IntoEnumIterator;
use tracing::debug;
use tracing::debug_span;
use tracing::info;
use tracing::instrument;
use tracing::warn;
use tracing::Instrument;

use crate::background::BackgroundLoad;
use crate::cache::CacheStatus;
use crate::cache::StatCache;
use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::error::Result;
use crate::model::DashboardStats;
use crate::model::StageUpdate;
use crate::model::StatPayload;
use crate::model::StatQuery;
use crate::traits::NoProgress;
use crate::traits::ProgressObserver;
use crate::traits::StatSource;
use crate::types::Stage;
use crate::types::StatKey;

fn source_error<E: Display>(key: StatKey, err: E) -> DashboardError {
    DashboardError::Source {
        key,
        message: err.to_string(),
    }
}

// Everything a fetch needs, detached from the service so background tasks can own it.
struct StatFetcher<S>
where
    S: StatSource,
{
    source:  Arc<S>,
    cache:   Arc<StatCache<StatPayload>>,
    timeout: Option<Duration>,
}

impl<S> Clone for StatFetcher<S>
where
    S: StatSource,
{
    fn clone(&self) -> Self {
        Self {
            source:  self.source.clone(),
            cache:   self.cache.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S> StatFetcher<S>
where
    S: StatSource,
{
    async fn timed_fetch(
        source: Arc<S>,
        timeout: Option<Duration>,
        key: StatKey,
        query: StatQuery,
    ) -> Result<StatPayload, DashboardError> {
        let fetch = source.fetch(key, query);
        match timeout {
            Some(after) => match tokio::time::timeout(after, fetch).await {
                Ok(res) => res.map_err(|e| source_error(key, e)),
                Err(_) => Err(DashboardError::Timeout { key, after }),
            },
            None => fetch.await.map_err(|e| source_error(key, e)),
        }
    }

    async fn fetch(&self, key: StatKey, query: StatQuery) -> Option<StatPayload> {
        let source = self.source.clone();
        let timeout = self.timeout;

        self.cache
            .fetch_with_cache(key.as_ref(), move || Self::timed_fetch(source, timeout, key, query))
            .await
    }

    // Straight to the source. A success replaces the cached entry, a failure is `None` whatever is cached.
    async fn fetch_uncached(&self, key: StatKey, query: StatQuery) -> Option<StatPayload> {
        match Self::timed_fetch(self.source.clone(), self.timeout, key, query).await {
            Ok(payload) => {
                self.cache.store(key.as_ref(), payload.clone()).await;
                Some(payload)
            }
            Err(err) => {
                warn!("{err}");
                None
            }
        }
    }

    // All-settled: every key gets an answer, a failed one is `None`.
    async fn fetch_many(&self, keys: &[StatKey], query: StatQuery) -> Vec<(StatKey, Option<StatPayload>)> {
        join_all(keys.iter().map(|&key| async move { (key, self.fetch(key, query).await) })).await
    }

    async fn run_stage(&self, stage: Stage, query: StatQuery, stats: &mut DashboardStats) -> StageUpdate {
        let mut failed = 0;
        for (key, payload) in self.fetch_many(stage.keys(), query).await {
            match payload {
                Some(payload) => stats.apply(payload),
                None => {
                    failed += 1;
                    debug!("{key} unavailable, keeping the empty default");
                }
            }
        }
        debug!("Stage '{stage}' done, {failed} of {} unavailable", stage.keys().len());
        stats.stage_update(stage)
    }
}

/// Loads dashboard statistics from a [`StatSource`] through a shared [`StatCache`].
///
/// The loaders never fail: a statistic that can be fetched neither from the source nor from the cache is left at its
/// empty default.
#[fxstruct(
    sync,
    no_new,
    default(off),
    builder(
        doc("Builder object of [`DashboardService`].", "", "See [`DashboardService::builder()`] method."),
        method_doc("Implement builder pattern for [`DashboardService`]."),
    )
)]
pub struct DashboardService<S>
where
    S: StatSource,
{
    #[fieldx(get(clone), builder(required, into))]
    source: Arc<S>,

    #[fieldx(get(clone), builder(into), default(Arc::new(StatCache::new())))]
    cache: Arc<StatCache<StatPayload>>,

    /// Limits used by the progressive loader.
    #[fieldx(get(copy), default(StatQuery::progressive()))]
    progressive_query: StatQuery,

    /// Limits used by the optimized and one-shot loaders.
    #[fieldx(get(copy), default(StatQuery::full()))]
    full_query: StatQuery,

    /// Upper bound for a single fetch. A fetch that runs out of time counts as failed.
    #[fieldx(get(copy), builder(into), default(None))]
    fetch_timeout: Option<Duration>,
}

impl<S> DashboardService<S>
where
    S: StatSource,
{
    pub fn from_config(source: S, config: &DashboardConfig) -> Result<Self> {
        let cache = StatCache::builder()
            .ttl(config.cache_ttl())
            .max_capacity(config.cache_capacity)
            .coalesce(config.coalesce_inflight)
            .name("dashboard")
            .build()
            .map_err(|e| DashboardError::Builder(format!("stat cache: {e}")))?;

        Self::builder()
            .source(source)
            .cache(cache)
            .progressive_query(config.progressive_query())
            .full_query(config.full_query())
            .fetch_timeout(config.fetch_timeout())
            .build()
            .map_err(|e| DashboardError::Builder(format!("dashboard service: {e}")))
    }

    fn fetcher(&self) -> StatFetcher<S> {
        StatFetcher {
            source:  self.source(),
            cache:   self.cache(),
            timeout: self.fetch_timeout(),
        }
    }

    /// Load the statistics stage by stage, reporting each completed stage to `observer`.
    ///
    /// Stages run in order: `core`, `movies`, `additional`. Fetches within a stage run concurrently and the stage
    /// completes when all of them have settled. Dropping the returned future cancels the load.
    #[instrument(level = "debug", skip(self, observer))]
    pub async fn load_progressive<O>(&self, observer: O) -> DashboardStats
    where
        O: ProgressObserver,
    {
        info!("Starting progressive dashboard load");
        let fetcher = self.fetcher();
        let query = self.progressive_query();
        let mut stats = DashboardStats::default();

        for stage in Stage::iter() {
            let update = fetcher.run_stage(stage, query, &mut stats).await;
            observer.on_stage(&update);
        }

        info!("Progressive dashboard load finished");
        stats
    }

    pub async fn load_progressive_default(&self) -> DashboardStats {
        self.load_progressive(NoProgress).await
    }

    /// The progressive load as a stream of exactly three stage updates, in stage order.
    ///
    /// Nothing is fetched until the stream is polled. Dropping it stops the load.
    pub fn progressive_stream(&self) -> impl Stream<Item = StageUpdate> + Send + 'static {
        let fetcher = self.fetcher();
        let query = self.progressive_query();

        futures::stream::unfold(
            (Stage::iter(), DashboardStats::default(), fetcher),
            move |(mut stages, mut stats, fetcher)| async move {
                let stage = stages.next()?;
                let update = fetcher.run_stage(stage, query, &mut stats).await;
                Some((update, (stages, stats, fetcher)))
            },
        )
    }

    /// Load the essential statistics, then return while the rest keep loading in the background.
    ///
    /// Categories and countries are in place when this returns. Top rated and top viewed movies form one background
    /// group; top favorite, top commented and view statistics form another. The groups run independently.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_optimized(&self) -> BackgroundLoad {
        info!("Starting optimized dashboard load");
        let fetcher = self.fetcher();
        let query = self.full_query();
        let (publisher, mut handle) = BackgroundLoad::start();
        let publisher = Arc::new(publisher);

        for stage in [Stage::Movies, Stage::Additional] {
            let fetcher = fetcher.clone();
            let publisher = publisher.clone();
            handle.spawn(
                async move {
                    let results = fetcher.fetch_many(stage.keys(), query).await;
                    debug!("Background group '{stage}' settled");
                    publisher.publish(results);
                }
                .instrument(debug_span!("background_group", %stage)),
            );
        }

        publisher.publish(fetcher.fetch_many(Stage::Core.keys(), query).await);
        handle.mark_seen();
        handle
    }

    /// Load all seven statistics at once, straight from the source.
    ///
    /// Cached entries are not consulted, so limits smaller than the full ones never leak in. Successful results still
    /// replace what is cached. A statistic that fails is left at its empty default.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_all(&self) -> DashboardStats {
        let fetcher = self.fetcher();
        let query = self.full_query();
        let mut stats = DashboardStats::default();

        let results = join_all(StatKey::iter().map(|key| {
            let fetcher = &fetcher;
            async move { (key, fetcher.fetch_uncached(key, query).await) }
        }))
        .await;

        for (key, payload) in results {
            match payload {
                Some(payload) => stats.apply(payload),
                None => warn!("Failed to fetch {key} stats"),
            }
        }

        stats
    }

    /// Drop every cached statistic.
    pub async fn clear_cache(&self) {
        self.cache().clear().await;
    }

    pub fn cache_status(&self) -> BTreeMap<String, CacheStatus> {
        self.cache().status()
    }
}
