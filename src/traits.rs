use async_trait::async_trait;
use std::fmt::Debug;
use std::fmt::Display;

use crate::model::MovieSummary;
use crate::model::StageUpdate;
use crate::model::StatPayload;
use crate::model::StatQuery;
use crate::model::TaxonomyStat;
use crate::model::TopCommentedMovie;
use crate::model::TopFavoriteMovie;
use crate::model::TopRatedMovie;
use crate::model::ViewPeriod;
use crate::model::ViewStats;
use crate::types::StatKey;

/// Where the statistics come from. Each method is one remote call; implementations do not retry.
#[async_trait]
pub trait StatSource: Send + Sync + 'static {
    type Error: Display + Debug + Send + Sync + 'static;

    async fn category_stats(&self) -> Result<Vec<TaxonomyStat>, Self::Error>;
    async fn country_stats(&self) -> Result<Vec<TaxonomyStat>, Self::Error>;
    async fn top_rated(&self, limit: u32) -> Result<Vec<TopRatedMovie>, Self::Error>;
    async fn top_viewed(&self, limit: u32) -> Result<Vec<MovieSummary>, Self::Error>;
    async fn top_favorite(&self, limit: u32) -> Result<Vec<TopFavoriteMovie>, Self::Error>;
    async fn top_commented(&self, limit: u32) -> Result<Vec<TopCommentedMovie>, Self::Error>;
    async fn view_stats(&self, period: ViewPeriod, limit: u32) -> Result<ViewStats, Self::Error>;

    /// Fetch the statistic named by `key`, applying the limits from `query` where they are relevant.
    async fn fetch(&self, key: StatKey, query: StatQuery) -> Result<StatPayload, Self::Error> {
        Ok(match key {
            StatKey::Categories => StatPayload::Categories(self.category_stats().await?),
            StatKey::Countries => StatPayload::Countries(self.country_stats().await?),
            StatKey::TopRated => StatPayload::TopRated(self.top_rated(query.top_limit).await?),
            StatKey::TopViewed => StatPayload::TopViewed(self.top_viewed(query.top_limit).await?),
            StatKey::TopFavorite => StatPayload::TopFavorite(self.top_favorite(query.top_limit).await?),
            StatKey::TopCommented => StatPayload::TopCommented(self.top_commented(query.top_limit).await?),
            StatKey::ViewStats => StatPayload::ViewStats(self.view_stats(query.view_period, query.view_limit).await?),
        })
    }
}

/// Receives partial results of a progressive load, once per completed stage.
pub trait ProgressObserver: Send + Sync {
    fn on_stage(&self, update: &StageUpdate);
}

impl<F> ProgressObserver for F
where
    F: Fn(&StageUpdate) + Send + Sync,
{
    fn on_stage(&self, update: &StageUpdate) {
        self(update)
    }
}

/// Observer that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_stage(&self, _update: &StageUpdate) {}
}
