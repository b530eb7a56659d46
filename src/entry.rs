use std::fmt::Debug;
use std::time::Duration;

use tokio::time::Instant;

/// A cached value and the moment it was stored.
///
/// Freshness is a read-time question: an entry is never marked stale when written, it only becomes stale relative to
/// the clock reading and the TTL it is asked about.
#[derive(Clone)]
pub struct CacheEntry<V> {
    data:      V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(data: V, stored_at: Instant) -> Self {
        Self { data, stored_at }
    }

    pub fn data(&self) -> &V {
        &self.data
    }

    pub fn stored_at(&self) -> Instant {
        self.stored_at
    }

    pub fn into_data(self) -> V {
        self.data
    }

    /// Time elapsed since the entry was stored. A clock reading earlier than `stored_at` counts as zero age.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    /// `true` while the entry is strictly younger than `ttl`.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

impl<V> Debug for CacheEntry<V>
where
    V: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("data", &self.data)
            .field("stored_at", &self.stored_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_is_strict() {
        let stored_at = Instant::now();
        let entry = CacheEntry::new(42u32, stored_at);
        let ttl = Duration::from_secs(300);

        assert!(entry.is_fresh(stored_at, ttl));
        assert!(entry.is_fresh(stored_at + Duration::from_secs(299), ttl));
        assert!(!entry.is_fresh(stored_at + ttl, ttl));
        assert!(!entry.is_fresh(stored_at + Duration::from_secs(301), ttl));
    }

    #[test]
    fn age_never_goes_negative() {
        let stored_at = Instant::now() + Duration::from_secs(10);
        let entry = CacheEntry::new("x", stored_at);

        assert_eq!(entry.age(stored_at - Duration::from_secs(5)), Duration::ZERO);
        assert_eq!(entry.age(stored_at + Duration::from_secs(7)), Duration::from_secs(7));
        assert_eq!(entry.into_data(), "x");
    }
}
