use std::fmt::Debug;
use std::sync::Arc;

use tokio::time::Instant;

/// Time source used by the cache to stamp entries and to judge their freshness.
///
/// The cache never asks the system for the time directly. Production code uses [`TokioClock`]; tests plug in a clock
/// they can move forward by hand.
pub trait Clock: Debug + Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Clock that follows [`tokio::time::Instant::now()`], including a paused test runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl TokioClock {
    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(TokioClock)
    }
}

impl Clock for TokioClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}
