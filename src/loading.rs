use std::collections::BTreeMap;

use serde::Serialize;
use strum::IntoEnumIterator;

use crate::types::LoadState;
use crate::types::StatKey;

/// Per-statistic load state of a single optimized load. Every key is present from the start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LoadingStatus {
    states: BTreeMap<StatKey, LoadState>,
}

impl Default for LoadingStatus {
    fn default() -> Self {
        Self {
            states: StatKey::iter().map(|k| (k, LoadState::Loading)).collect(),
        }
    }
}

impl LoadingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: StatKey) -> LoadState {
        self.states.get(&key).copied().unwrap_or_default()
    }

    pub fn set(&mut self, key: StatKey, state: LoadState) {
        self.states.insert(key, state);
    }

    /// Record the outcome of one fetch: a value, stale or not, means loaded.
    pub fn settle(&mut self, key: StatKey, obtained: bool) {
        self.set(key, if obtained { LoadState::Loaded } else { LoadState::Error });
    }

    /// `true` once no key is in the `Loading` state.
    pub fn is_settled(&self) -> bool {
        self.states.values().all(|s| *s != LoadState::Loading)
    }

    pub fn count(&self, state: LoadState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatKey, LoadState)> + '_ {
        self.states.iter().map(|(k, s)| (*k, *s))
    }
}
