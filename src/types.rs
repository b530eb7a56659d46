use serde::Deserialize;
use serde::Serialize;
use strum::AsRefStr;
use strum::Display;
use strum::EnumIter;
use strum::EnumString;

/// Names of the seven dashboard statistics. The string form is the cache key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum StatKey {
    Categories,
    Countries,
    TopRated,
    TopViewed,
    TopFavorite,
    TopCommented,
    ViewStats,
}

impl StatKey {
    /// Stage of the progressive loader this statistic belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Categories | Self::Countries => Stage::Core,
            Self::TopRated | Self::TopViewed => Stage::Movies,
            Self::TopFavorite | Self::TopCommented | Self::ViewStats => Stage::Additional,
        }
    }

    /// `true` for the statistics whose request takes a result limit.
    pub fn is_limited(&self) -> bool {
        !matches!(self, Self::Categories | Self::Countries)
    }
}

/// Progressive loading stages, in the order they run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Core,
    Movies,
    Additional,
}

impl Stage {
    pub fn keys(&self) -> &'static [StatKey] {
        match self {
            Self::Core => &[StatKey::Categories, StatKey::Countries],
            Self::Movies => &[StatKey::TopRated, StatKey::TopViewed],
            Self::Additional => &[StatKey::TopFavorite, StatKey::TopCommented, StatKey::ViewStats],
        }
    }
}

/// Per-statistic state reported by the optimized loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Loading,
    Loaded,
    Error,
}
