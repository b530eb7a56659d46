//! # dash-loader
//!
//! Cache-aware, progressive loader for the statistics shown on a movie-streaming platform's admin dashboard.
//!
//! The dashboard renders seven aggregate statistics served by a REST backend: movie counts per category and per
//! country, top rated, top viewed, top favorite and top commented movies, and view counts over a period. Fetching all of
//! them takes a while, so this crate loads them in a way that lets the dashboard show something early and keeps
//! showing something when the backend misbehaves.
//!
//! # The Basics
//!
//! - Every fetch goes through a [`StatCache`]: a fresh entry is served without touching the backend, a failed fetch
//!   falls back to whatever is cached, stale or not.
//! - [`DashboardService::load_progressive()`] loads in three stages (`core`, `movies`, `additional`) and reports each
//!   stage as it completes. [`DashboardService::progressive_stream()`] does the same as a stream.
//! - [`DashboardService::load_optimized()`] returns as soon as the essential statistics are in and keeps loading the
//!   rest in the background, exposing progress through a [`BackgroundLoad`] handle.
//! - [`DashboardService::load_all()`] fetches everything at once, straight from the backend, and refreshes the cache
//!   with what it got.
//!
//! None of the loaders return an error. A statistic that could not be obtained stays at its empty default.
//!
//! # Data Source
//!
//! The backend is abstracted by the [`StatSource`] trait. [`HttpStatSource`] implements it over HTTP; tests use a
//! scripted source from the `test` module (enabled with the `test` feature).
//!
//! ```ignore
//! let config = DashboardConfig::load("dashboard.toml")?;
//! let source = HttpStatSource::from_config(&config)?;
//! let service = DashboardService::from_config(source, &config)?;
//!
//! let stats = service
//!     .load_progressive(|update: &StageUpdate| println!("stage {} ready", update.stage()))
//!     .await;
//! ```

pub mod background;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod loading;
pub mod model;
pub mod service;
pub mod traits;
pub mod types;

#[cfg(feature = "cli")]
pub mod app;

#[doc(inline)]
pub use background::BackgroundLoad;
#[doc(inline)]
pub use cache::StatCache;
#[doc(inline)]
pub use client::HttpStatSource;
#[doc(inline)]
pub use config::DashboardConfig;
#[doc(inline)]
pub use error::DashboardError;
#[doc(inline)]
pub use service::DashboardService;
#[doc(inline)]
pub use traits::StatSource;

pub mod prelude {
    pub use crate::background::BackgroundLoad;
    pub use crate::cache::CacheStatus;
    pub use crate::cache::StatCache;
    pub use crate::client::HttpStatSource;
    pub use crate::clock::Clock;
    pub use crate::clock::TokioClock;
    pub use crate::config::DashboardConfig;
    pub use crate::error::DashboardError;
    pub use crate::loading::LoadingStatus;
    pub use crate::model::*;
    pub use crate::service::DashboardService;
    pub use crate::traits::NoProgress;
    pub use crate::traits::ProgressObserver;
    pub use crate::traits::StatSource;
    pub use crate::types::*;
}
