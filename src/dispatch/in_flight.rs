//! Shared registry of correlation ids with unresolved submissions.

use std::sync::Arc;

use dashmap::DashMap;

/// Correlation ids currently owned by a retry loop.
///
/// Cheap to clone; all clones share the same table. Dispatch inserts
/// before handing a work request to the retry engine, and the retry
/// engine removes only once the work lands on-chain.
#[derive(Clone, Debug, Default)]
pub struct InFlightSet {
    ids: Arc<DashMap<String, ()>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a correlation id. Returns false if it was already claimed,
    /// in which case the caller must not start another retry loop for it.
    pub fn insert(&self, id: &str) -> bool {
        self.ids.insert(id.to_string(), ()).is_none()
    }

    pub fn remove(&self, id: &str) {
        self.ids.remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Ids to pass as a skip list to freshly spawned job processes.
    pub fn snapshot(&self) -> Vec<String> {
        self.ids.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
