//! HTTP implementation of [`StatSource`] against the platform's REST backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::header::AUTHORIZATION;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::instrument;

use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::error::Result;
use crate::model::ApiResponse;
use crate::model::MovieSummary;
use crate::model::TaxonomyStat;
use crate::model::TopCommentedMovie;
use crate::model::TopFavoriteMovie;
use crate::model::TopRatedMovie;
use crate::model::ViewPeriod;
use crate::model::ViewStats;
use crate::traits::StatSource;

const USER_AGENT_VALUE: &str = concat!("dash-loader/", env!("CARGO_PKG_VERSION"));

pub const CATEGORY_STATS_PATH: &str = "/api/admin/stats/categories";
pub const COUNTRY_STATS_PATH: &str = "/api/admin/stats/countries";
pub const TOP_RATED_PATH: &str = "/api/admin/stats/top-rated";
pub const TOP_VIEWED_PATH: &str = "/api/admin/stats/top-viewed";
pub const TOP_FAVORITE_PATH: &str = "/api/admin/stats/top-favorite";
pub const TOP_COMMENTED_PATH: &str = "/api/admin/stats/top-commented";
pub const VIEW_STATS_PATH: &str = "/api/movies/views/stats";

/// Fetches statistics over HTTP. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpStatSource {
    client:   reqwest::Client,
    base_url: String,
}

impl HttpStatSource {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| DashboardError::Config(format!("invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            default_headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| DashboardError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        Self::new(&config.base_url, config.token.as_deref(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(level = "trace", skip(self))]
    async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, ?query, "fetching statistic");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| DashboardError::Http {
                endpoint: path.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::Status {
                endpoint: path.to_string(),
                status:   status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| DashboardError::Http {
            endpoint: path.to_string(),
            source,
        })?;

        let envelope: ApiResponse<T> = serde_json::from_slice(&body).map_err(|source| DashboardError::Decode {
            endpoint: path.to_string(),
            source,
        })?;

        if !envelope.success {
            return Err(DashboardError::Api {
                endpoint: path.to_string(),
                message:  envelope.message.unwrap_or_else(|| "no message".to_string()),
            });
        }

        Ok(envelope.into_data())
    }

    fn limit(limit: u32) -> [(&'static str, String); 1] {
        [("limit", limit.to_string())]
    }
}

#[async_trait]
impl StatSource for HttpStatSource {
    type Error = DashboardError;

    async fn category_stats(&self) -> Result<Vec<TaxonomyStat>> {
        self.get(CATEGORY_STATS_PATH, &[]).await
    }

    async fn country_stats(&self) -> Result<Vec<TaxonomyStat>> {
        self.get(COUNTRY_STATS_PATH, &[]).await
    }

    async fn top_rated(&self, limit: u32) -> Result<Vec<TopRatedMovie>> {
        self.get(TOP_RATED_PATH, &Self::limit(limit)).await
    }

    async fn top_viewed(&self, limit: u32) -> Result<Vec<MovieSummary>> {
        self.get(TOP_VIEWED_PATH, &Self::limit(limit)).await
    }

    async fn top_favorite(&self, limit: u32) -> Result<Vec<TopFavoriteMovie>> {
        self.get(TOP_FAVORITE_PATH, &Self::limit(limit)).await
    }

    async fn top_commented(&self, limit: u32) -> Result<Vec<TopCommentedMovie>> {
        self.get(TOP_COMMENTED_PATH, &Self::limit(limit)).await
    }

    async fn view_stats(&self, period: ViewPeriod, limit: u32) -> Result<ViewStats> {
        self.get(
            VIEW_STATS_PATH,
            &[("period", period.to_string()), ("limit", limit.to_string())],
        )
        .await
    }
}
