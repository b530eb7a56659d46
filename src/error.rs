use std::time::Duration;

use thiserror::Error;

use crate::types::StatKey;

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source:   reqwest::Error,
    },

    #[error("{endpoint} responded with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("cannot decode response of {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source:   serde_json::Error,
    },

    #[error("{endpoint} reported failure: {message}")]
    Api { endpoint: String, message: String },

    #[error("fetching {key} timed out after {after:?}")]
    Timeout { key: StatKey, after: Duration },

    #[error("fetching {key} failed: {message}")]
    Source { key: StatKey, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    Validation(#[from] garde::Report),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("cannot build {0}")]
    Builder(String),
}

impl DashboardError {
    /// `true` for failures caused by the remote side or the network rather than by local setup.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Status { .. } | Self::Decode { .. } | Self::Api { .. } | Self::Timeout { .. }
        )
    }
}
