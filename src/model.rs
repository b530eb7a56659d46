//! Wire shapes of the statistics endpoints and the aggregate the loaders produce.

use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use strum::AsRefStr;
use strum::Display as StrumDisplay;
use strum::EnumIter;
use strum::EnumString;

use crate::types::Stage;
use crate::types::StatKey;

/// The `{ success, message, data }` envelope every endpoint wraps its payload in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data:    Option<T>,
}

impl<T: Default> ApiResponse<T> {
    /// The payload, or its empty default when the envelope carries none.
    pub fn into_data(self) -> T {
        self.data.unwrap_or_default()
    }
}

/// Movie count of a category or a country.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaxonomyStat {
    pub id:          String,
    pub name:        String,
    pub slug:        String,
    pub movie_count: u64,
}

/// Fields shared by every "top movies" list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovieSummary {
    pub id:          String,
    pub name:        String,
    pub slug:        String,
    pub origin_name: Option<String>,
    pub poster_url:  Option<String>,
    pub thumb_url:   Option<String>,
    pub year:        Option<u32>,
    pub view:        u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopRatedMovie {
    #[serde(flatten)]
    pub movie:          MovieSummary,
    #[serde(default, deserialize_with = "number_or_string")]
    pub average_rating: f64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub rating_count:   u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteCounts {
    #[serde(default)]
    pub favorites: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopFavoriteMovie {
    #[serde(flatten)]
    pub movie:   MovieSummary,
    #[serde(rename = "favoriteCount", default, skip_serializing_if = "Option::is_none")]
    favorite_count_camel: Option<u64>,
    #[serde(rename = "favorite_count", default, skip_serializing_if = "Option::is_none")]
    favorite_count_snake: Option<u64>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    counts: Option<FavoriteCounts>,
}

impl TopFavoriteMovie {
    pub fn new(movie: MovieSummary, favorite_count: u64) -> Self {
        Self {
            movie,
            favorite_count_camel: Some(favorite_count),
            ..Default::default()
        }
    }

    /// The backend reports the count under one of several names; the first one present wins.
    pub fn favorite_count(&self) -> u64 {
        self.favorite_count_camel
            .or(self.favorite_count_snake)
            .or_else(|| self.counts.as_ref().and_then(|c| c.favorites))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentCounts {
    #[serde(default)]
    pub comments: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopCommentedMovie {
    #[serde(flatten)]
    pub movie:   MovieSummary,
    #[serde(rename = "commentCount", default, skip_serializing_if = "Option::is_none")]
    comment_count_camel: Option<u64>,
    #[serde(rename = "comment_count", default, skip_serializing_if = "Option::is_none")]
    comment_count_snake: Option<u64>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    counts: Option<CommentCounts>,
}

impl TopCommentedMovie {
    pub fn new(movie: MovieSummary, comment_count: u64) -> Self {
        Self {
            movie,
            comment_count_camel: Some(comment_count),
            ..Default::default()
        }
    }

    pub fn comment_count(&self) -> u64 {
        self.comment_count_camel
            .or(self.comment_count_snake)
            .or_else(|| self.counts.as_ref().and_then(|c| c.comments))
            .unwrap_or(0)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, StrumDisplay, AsRefStr, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ViewPeriod {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPoint {
    pub date:  String,
    pub views: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewStats {
    pub period:      ViewPeriod,
    pub total_views: u64,
    pub data:        Vec<ViewPoint>,
}

/// Request parameters applied to the limited statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatQuery {
    pub top_limit:   u32,
    pub view_period: ViewPeriod,
    pub view_limit:  u32,
}

impl StatQuery {
    pub const PROGRESSIVE_LIMIT: u32 = 5;
    pub const FULL_LIMIT: u32 = 10;
    pub const VIEW_LIMIT: u32 = 30;

    /// Parameters of the progressive loader.
    pub fn progressive() -> Self {
        Self {
            top_limit:   Self::PROGRESSIVE_LIMIT,
            view_period: ViewPeriod::Month,
            view_limit:  Self::VIEW_LIMIT,
        }
    }

    /// Parameters of the optimized and one-shot loaders.
    pub fn full() -> Self {
        Self {
            top_limit:   Self::FULL_LIMIT,
            view_period: ViewPeriod::Month,
            view_limit:  Self::VIEW_LIMIT,
        }
    }
}

impl Default for StatQuery {
    fn default() -> Self {
        Self::full()
    }
}

/// A decoded value of one statistic. This is what the cache stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "key", content = "data", rename_all = "camelCase")]
pub enum StatPayload {
    Categories(Vec<TaxonomyStat>),
    Countries(Vec<TaxonomyStat>),
    TopRated(Vec<TopRatedMovie>),
    TopViewed(Vec<MovieSummary>),
    TopFavorite(Vec<TopFavoriteMovie>),
    TopCommented(Vec<TopCommentedMovie>),
    ViewStats(ViewStats),
}

impl StatPayload {
    /// The empty value of the statistic named by `key`.
    pub fn empty(key: StatKey) -> Self {
        DashboardStats::default().payload(key)
    }

    pub fn key(&self) -> StatKey {
        match self {
            Self::Categories(_) => StatKey::Categories,
            Self::Countries(_) => StatKey::Countries,
            Self::TopRated(_) => StatKey::TopRated,
            Self::TopViewed(_) => StatKey::TopViewed,
            Self::TopFavorite(_) => StatKey::TopFavorite,
            Self::TopCommented(_) => StatKey::TopCommented,
            Self::ViewStats(_) => StatKey::ViewStats,
        }
    }

    /// Number of records carried; for view stats, the number of data points.
    pub fn len(&self) -> usize {
        match self {
            Self::Categories(v) | Self::Countries(v) => v.len(),
            Self::TopRated(v) => v.len(),
            Self::TopViewed(v) => v.len(),
            Self::TopFavorite(v) => v.len(),
            Self::TopCommented(v) => v.len(),
            Self::ViewStats(v) => v.data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The seven statistics as the dashboard renders them. Fields are never absent, only empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub category_stats: Vec<TaxonomyStat>,
    pub country_stats:  Vec<TaxonomyStat>,
    pub top_rated:      Vec<TopRatedMovie>,
    pub top_viewed:     Vec<MovieSummary>,
    pub top_favorite:   Vec<TopFavoriteMovie>,
    pub top_commented:  Vec<TopCommentedMovie>,
    pub view_stats:     ViewStats,
}

impl DashboardStats {
    /// Write the payload into its own field. No other field is touched.
    pub fn apply(&mut self, payload: StatPayload) {
        match payload {
            StatPayload::Categories(v) => self.category_stats = v,
            StatPayload::Countries(v) => self.country_stats = v,
            StatPayload::TopRated(v) => self.top_rated = v,
            StatPayload::TopViewed(v) => self.top_viewed = v,
            StatPayload::TopFavorite(v) => self.top_favorite = v,
            StatPayload::TopCommented(v) => self.top_commented = v,
            StatPayload::ViewStats(v) => self.view_stats = v,
        }
    }

    /// Copy of the field named by `key`.
    pub fn payload(&self, key: StatKey) -> StatPayload {
        match key {
            StatKey::Categories => StatPayload::Categories(self.category_stats.clone()),
            StatKey::Countries => StatPayload::Countries(self.country_stats.clone()),
            StatKey::TopRated => StatPayload::TopRated(self.top_rated.clone()),
            StatKey::TopViewed => StatPayload::TopViewed(self.top_viewed.clone()),
            StatKey::TopFavorite => StatPayload::TopFavorite(self.top_favorite.clone()),
            StatKey::TopCommented => StatPayload::TopCommented(self.top_commented.clone()),
            StatKey::ViewStats => StatPayload::ViewStats(self.view_stats.clone()),
        }
    }

    /// Snapshot of the fields belonging to `stage`.
    pub fn stage_update(&self, stage: Stage) -> StageUpdate {
        match stage {
            Stage::Core => StageUpdate::Core {
                category_stats: self.category_stats.clone(),
                country_stats:  self.country_stats.clone(),
            },
            Stage::Movies => StageUpdate::Movies {
                top_rated:  self.top_rated.clone(),
                top_viewed: self.top_viewed.clone(),
            },
            Stage::Additional => StageUpdate::Additional {
                top_favorite:  self.top_favorite.clone(),
                top_commented: self.top_commented.clone(),
                view_stats:    self.view_stats.clone(),
            },
        }
    }

    /// Merge a stage update, overwriting the fields it carries.
    pub fn absorb(&mut self, update: &StageUpdate) {
        match update.clone() {
            StageUpdate::Core {
                category_stats,
                country_stats,
            } => {
                self.category_stats = category_stats;
                self.country_stats = country_stats;
            }
            StageUpdate::Movies { top_rated, top_viewed } => {
                self.top_rated = top_rated;
                self.top_viewed = top_viewed;
            }
            StageUpdate::Additional {
                top_favorite,
                top_commented,
                view_stats,
            } => {
                self.top_favorite = top_favorite;
                self.top_commented = top_commented;
                self.view_stats = view_stats;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Partial result delivered after a progressive stage completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum StageUpdate {
    Core {
        category_stats: Vec<TaxonomyStat>,
        country_stats:  Vec<TaxonomyStat>,
    },
    Movies {
        top_rated:  Vec<TopRatedMovie>,
        top_viewed: Vec<MovieSummary>,
    },
    Additional {
        top_favorite:  Vec<TopFavoriteMovie>,
        top_commented: Vec<TopCommentedMovie>,
        view_stats:    ViewStats,
    },
}

impl StageUpdate {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Core { .. } => Stage::Core,
            Self::Movies { .. } => Stage::Movies,
            Self::Additional { .. } => Stage::Additional,
        }
    }
}

// Ratings come back as decimal strings from some backend versions and as numbers from others.
fn number_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Raw::<T>::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
