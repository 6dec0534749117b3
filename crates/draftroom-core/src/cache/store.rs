use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::api::ApiError;
use crate::query::QueryDescriptor;

use super::entry::{CacheEntry, QuerySnapshot, RequestId, ResourceId};

/// Keyed store of fetched entities.
///
/// Only the query and mutation executors write to the cache; everything else
/// reads snapshots or watches entries.
#[derive(Debug, Default)]
pub struct EntityCache {
    entries: HashMap<ResourceId, CacheEntry>,
    last_request: u64,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure(&mut self, descriptor: &Arc<QueryDescriptor>) -> &mut CacheEntry {
        self.entries
            .entry(descriptor.resource_id())
            .or_insert_with(|| CacheEntry::new(Arc::clone(descriptor)))
    }

    /// Start a request for the descriptor's entry and return its token.
    pub fn mark_loading(&mut self, descriptor: &Arc<QueryDescriptor>) -> RequestId {
        self.last_request += 1;
        let request = RequestId(self.last_request);
        self.ensure(descriptor).begin(request);
        request
    }

    /// Store the outcome of `request`. Returns false when the result was
    /// discarded because a newer request already completed or the entry is gone.
    pub fn upsert(&mut self, id: &ResourceId, request: RequestId, data: Arc<Value>) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => entry.apply_success(request, data),
            None => false,
        }
    }

    pub fn mark_error(&mut self, id: &ResourceId, request: RequestId, error: ApiError) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => entry.apply_error(request, error),
            None => false,
        }
    }

    /// Flag an entry for refetch without dropping its data.
    pub fn invalidate(&mut self, id: &ResourceId) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.invalidate();
                true
            }
            None => false,
        }
    }

    /// Register a consumer of the descriptor's entry, creating it if needed.
    pub fn subscribe(&mut self, descriptor: &Arc<QueryDescriptor>) -> watch::Receiver<QuerySnapshot> {
        let entry = self.ensure(descriptor);
        entry.add_subscriber();
        entry.watch()
    }

    /// Returns true when the entry has no consumers left.
    pub fn unsubscribe(&mut self, id: &ResourceId) -> bool {
        self.entries
            .get_mut(id)
            .is_some_and(CacheEntry::remove_subscriber)
    }

    /// Descriptors of every entry that currently has subscribers.
    pub fn active_descriptors(&self) -> Vec<Arc<QueryDescriptor>> {
        self.entries
            .values()
            .filter(|entry| entry.subscriber_count() > 0)
            .map(|entry| Arc::clone(entry.descriptor()))
            .collect()
    }

    pub fn watch(&self, id: &ResourceId) -> Option<watch::Receiver<QuerySnapshot>> {
        self.entries.get(id).map(CacheEntry::watch)
    }

    /// Remove entries that have gone unused for at least `keep_unused_for`.
    pub fn evict_unused(&mut self, keep_unused_for: Duration, now: Instant) -> Vec<ResourceId> {
        let expired: Vec<ResourceId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_collectable(keep_unused_for, now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            debug!(resource = %id, "Evicting unused cache entry");
            self.entries.remove(id);
        }
        expired
    }

    /// Drop every entry. Request tokens keep counting so late completions
    /// from before the reset are never mistaken for new ones.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntryStatus;
    use serde_json::json;

    fn draft(id: &str) -> Arc<QueryDescriptor> {
        Arc::new(QueryDescriptor::new("draft", id))
    }

    #[test]
    fn test_get_missing_entry() {
        let cache = EntityCache::new();
        assert!(cache.get(&ResourceId::new("draft", "123")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_read_your_writes() {
        let mut cache = EntityCache::new();
        let descriptor = draft("123");
        let id = descriptor.resource_id();

        let request = cache.mark_loading(&descriptor);
        assert_eq!(cache.get(&id).unwrap().status(), EntryStatus::Loading);

        let data = Arc::new(json!({"id": "123", "picks": []}));
        assert!(cache.upsert(&id, request, Arc::clone(&data)));

        let entry = cache.get(&id).unwrap();
        assert_eq!(entry.status(), EntryStatus::Success);
        assert_eq!(entry.data(), Some(&data));
        assert!(entry.last_fetched_at().is_some());
    }

    #[test]
    fn test_request_tokens_increase() {
        let mut cache = EntityCache::new();
        let first = cache.mark_loading(&draft("1"));
        let second = cache.mark_loading(&draft("2"));
        let third = cache.mark_loading(&draft("1"));
        assert!(first < second && second < third);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_upsert_unknown_entry_is_discarded() {
        let mut cache = EntityCache::new();
        let id = ResourceId::new("draft", "missing");
        assert!(!cache.upsert(&id, RequestId(1), Arc::new(json!(null))));
        assert!(!cache.mark_error(&id, RequestId(1), ApiError::Decode("x".into())));
        assert!(!cache.invalidate(&id));
    }

    #[test]
    fn test_mark_error() {
        let mut cache = EntityCache::new();
        let descriptor = draft("999");
        let id = descriptor.resource_id();
        let request = cache.mark_loading(&descriptor);
        let error = ApiError::Http {
            status: 404,
            body: "not found".into(),
        };
        assert!(cache.mark_error(&id, request, error.clone()));

        let entry = cache.get(&id).unwrap();
        assert_eq!(entry.status(), EntryStatus::Error);
        assert_eq!(entry.error(), Some(&error));
    }

    #[test]
    fn test_subscribe_counts_and_notifies() {
        let mut cache = EntityCache::new();
        let descriptor = draft("123");
        let id = descriptor.resource_id();

        let rx = cache.subscribe(&descriptor);
        let _rx2 = cache.subscribe(&descriptor);
        assert_eq!(cache.get(&id).unwrap().subscriber_count(), 2);

        let request = cache.mark_loading(&descriptor);
        cache.upsert(&id, request, Arc::new(json!(1)));
        assert_eq!(rx.borrow().status, EntryStatus::Success);

        assert!(!cache.unsubscribe(&id));
        assert!(cache.unsubscribe(&id));
        assert!(!cache.unsubscribe(&ResourceId::new("draft", "other")));
    }

    #[test]
    fn test_active_descriptors() {
        let mut cache = EntityCache::new();
        let watched = draft("1");
        let _rx = cache.subscribe(&watched);
        cache.mark_loading(&draft("2"));

        let active = cache.active_descriptors();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].resource_id(), watched.resource_id());
    }

    #[test]
    fn test_evict_unused_skips_subscribed_and_fetching() {
        let mut cache = EntityCache::new();
        let keep = Duration::from_secs(60);
        let subscribed = draft("1");
        let fetching = draft("2");
        let unused = draft("3");

        let _rx = cache.subscribe(&subscribed);
        cache.mark_loading(&fetching);
        let request = cache.mark_loading(&unused);
        cache.upsert(&unused.resource_id(), request, Arc::new(json!(3)));

        let evicted = cache.evict_unused(keep, Instant::now() + keep);
        assert_eq!(evicted, vec![unused.resource_id()]);
        assert!(cache.get(&subscribed.resource_id()).is_some());
        assert!(cache.get(&fetching.resource_id()).is_some());
        assert!(cache.get(&unused.resource_id()).is_none());
    }

    #[test]
    fn test_evict_waits_for_grace_period() {
        let mut cache = EntityCache::new();
        let descriptor = draft("1");
        let _ = cache.subscribe(&descriptor);
        cache.unsubscribe(&descriptor.resource_id());

        let evicted = cache.evict_unused(Duration::from_secs(60), Instant::now());
        assert!(evicted.is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_keeps_request_counter() {
        let mut cache = EntityCache::new();
        let before = cache.mark_loading(&draft("1"));
        cache.clear();
        assert!(cache.is_empty());
        let after = cache.mark_loading(&draft("1"));
        assert!(after > before);
    }
}
