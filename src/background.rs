use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use crate::loading::LoadingStatus;
use crate::model::DashboardStats;
use crate::model::StatPayload;
use crate::types::StatKey;

/// Write side of a [`BackgroundLoad`], shared by the tasks filling it in.
#[derive(Debug)]
pub(crate) struct LoadPublisher {
    stats:  watch::Sender<DashboardStats>,
    status: watch::Sender<LoadingStatus>,
}

impl LoadPublisher {
    /// Apply a settled group of fetches. Stats are published before statuses, so a `Loaded` key is always visible.
    pub(crate) fn publish(&self, results: Vec<(StatKey, Option<StatPayload>)>) {
        self.stats.send_modify(|stats| {
            for (_, payload) in results.iter() {
                if let Some(payload) = payload {
                    stats.apply(payload.clone());
                }
            }
        });

        self.status.send_modify(|status| {
            for (key, payload) in results.iter() {
                status.settle(*key, payload.is_some());
            }
        });
    }
}

/// Result handle of an optimized load.
///
/// Essential statistics are already in place when the handle is returned. The remaining groups keep loading in the
/// background; their progress is observed through [`stats()`](Self::stats), [`status()`](Self::status) and
/// [`changed()`](Self::changed). Dropping the handle aborts whatever is still running.
#[derive(Debug)]
pub struct BackgroundLoad {
    stats:  watch::Receiver<DashboardStats>,
    status: watch::Receiver<LoadingStatus>,
    tasks:  JoinSet<()>,
}

impl BackgroundLoad {
    pub(crate) fn start() -> (LoadPublisher, Self) {
        let (stats_tx, stats_rx) = watch::channel(DashboardStats::default());
        let (status_tx, status_rx) = watch::channel(LoadingStatus::new());

        (
            LoadPublisher {
                stats:  stats_tx,
                status: status_tx,
            },
            Self {
                stats:  stats_rx,
                status: status_rx,
                tasks:  JoinSet::new(),
            },
        )
    }

    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Treat everything published so far as seen by [`changed()`](Self::changed).
    pub(crate) fn mark_seen(&mut self) {
        let _ = self.stats.borrow_and_update();
        let _ = self.status.borrow_and_update();
    }

    /// Snapshot of the statistics loaded so far.
    pub fn stats(&self) -> DashboardStats {
        self.stats.borrow().clone()
    }

    /// Snapshot of the per-key load states.
    pub fn status(&self) -> LoadingStatus {
        self.status.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.status.borrow().is_settled()
    }

    /// Wait for the next background update. Returns `false` once no more updates can arrive.
    pub async fn changed(&mut self) -> bool {
        self.status.changed().await.is_ok()
    }

    /// Stream of load states, one item per background update after this call.
    pub fn status_updates(&self) -> WatchStream<LoadingStatus> {
        WatchStream::from_changes(self.status.clone())
    }

    /// Wait for every background group and return the final statistics and load states.
    pub async fn finish(mut self) -> (DashboardStats, LoadingStatus) {
        while let Some(res) = self.tasks.join_next().await {
            if let Err(err) = res {
                debug!("background group did not complete: {err}");
            }
        }
        (self.stats(), self.status())
    }

    /// Stop the background groups. Keys they had not settled stay `Loading`.
    pub fn abort(&mut self) {
        self.tasks.abort_all();
    }
}
