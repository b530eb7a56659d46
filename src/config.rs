use std::path::Path;
use std::time::Duration;

use garde::Validate;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::cache::DEFAULT_TTL;
use crate::error::Result;
use crate::model::StatQuery;
use crate::model::ViewPeriod;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Settings of the HTTP source, the cache and the loaders.
///
/// Usually read from a TOML file; every key is optional:
///
/// ```toml
/// base_url = "https://api.example.com"
/// token = "..."
/// cache_ttl_secs = 300
/// coalesce_inflight = false
/// request_timeout_secs = 30
/// progressive_limit = 5
/// full_limit = 10
/// view_period = "month"
/// view_limit = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// Root of the REST backend, without the `/api` part.
    #[garde(url)]
    pub base_url: String,

    /// Bearer token sent with every request.
    #[garde(skip)]
    pub token: Option<String>,

    #[garde(range(min = 1))]
    pub cache_ttl_secs: u64,

    #[garde(range(min = 7))]
    pub cache_capacity: u64,

    #[garde(skip)]
    pub coalesce_inflight: bool,

    #[garde(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Upper bound for a single statistic fetch, on top of the HTTP timeout.
    #[garde(range(min = 1))]
    pub fetch_timeout_secs: Option<u64>,

    #[garde(range(min = 1, max = 100))]
    pub progressive_limit: u32,

    #[garde(range(min = 1, max = 100))]
    pub full_limit: u32,

    #[garde(skip)]
    pub view_period: ViewPeriod,

    #[garde(range(min = 1, max = 366))]
    pub view_limit: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url:             DEFAULT_BASE_URL.to_string(),
            token:                None,
            cache_ttl_secs:       DEFAULT_TTL.as_secs(),
            cache_capacity:       64,
            coalesce_inflight:    false,
            request_timeout_secs: 30,
            fetch_timeout_secs:   None,
            progressive_limit:    StatQuery::PROGRESSIVE_LIMIT,
            full_limit:           StatQuery::FULL_LIMIT,
            view_period:          ViewPeriod::Month,
            view_limit:           StatQuery::VIEW_LIMIT,
        }
    }
}

impl DashboardConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config: Self = toml::from_str(src)?;
        config.validated()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn progressive_query(&self) -> StatQuery {
        StatQuery {
            top_limit:   self.progressive_limit,
            view_period: self.view_period,
            view_limit:  self.view_limit,
        }
    }

    pub fn full_query(&self) -> StatQuery {
        StatQuery {
            top_limit:   self.full_limit,
            view_period: self.view_period,
            view_limit:  self.view_limit,
        }
    }
}
