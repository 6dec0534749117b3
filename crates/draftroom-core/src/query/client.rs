//! Query executor.
//!
//! `QueryClient` owns the entity cache, the tag index, and the table of
//! in-flight requests for one application session. Views read through it;
//! nothing else writes to the cache.
//!
//! A query is answered from the cache when the entry is fresh. Otherwise the
//! caller joins the request already in flight for that resource, or a new
//! one is started on its own task so that dropping every caller never aborts
//! it. All state transitions happen under one lock that is never held across
//! an await point.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{ApiError, HttpTransport, Transport};
use crate::cache::{
    CacheEntry, EntityCache, EntryStatus, QuerySnapshot, RequestId, ResourceId, Tag, TagIndex,
};
use crate::config::{ClientConfig, QueryConfig};

use super::descriptor::QueryDescriptor;
use super::subscription::{QueryResult, QuerySubscription};

type SharedResult = Shared<BoxFuture<'static, Result<Arc<Value>, ApiError>>>;

struct InFlight {
    request: RequestId,
    result: SharedResult,
}

/// Settles the request if its task ends without completing it (panic or
/// runtime shutdown), so the entry never stays fetching forever.
struct CompletionGuard {
    client: QueryClient,
    descriptor: Arc<QueryDescriptor>,
    request: RequestId,
    done: bool,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.done {
            let error = ApiError::Network("request task aborted".to_string());
            let _ = self.client.complete(&self.descriptor, self.request, Err(error));
        }
    }
}

#[derive(Default)]
struct SyncState {
    cache: EntityCache,
    tags: TagIndex,
    in_flight: HashMap<ResourceId, InFlight>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: QueryConfig,
    state: Mutex<SyncState>,
}

/// Session-scoped cache context shared by every query and mutation.
///
/// Clone is cheap and every clone shares the same cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl QueryClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, QueryConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: QueryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    /// Build a client talking HTTP to the configured draft service.
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_config(Arc::new(transport), config.query_config()))
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a query: cached data when fresh, otherwise the result of the
    /// single request in flight for its resource.
    ///
    /// An entry whose last fetch failed keeps returning that error until it
    /// is refetched or invalidated.
    pub async fn fetch(&self, descriptor: &QueryDescriptor) -> Result<Arc<Value>, ApiError> {
        let descriptor = Arc::new(descriptor.clone());
        let pending = {
            let mut state = self.lock();
            if let Some(outcome) = self.cached_outcome(&state, &descriptor) {
                return outcome;
            }
            self.start_request(&mut state, &descriptor, false)
        };
        pending.await
    }

    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<T, ApiError> {
        let value = self.fetch(descriptor).await?;
        Ok(T::deserialize(&*value)?)
    }

    /// Start a new request even if the entry is fresh or already fetching.
    /// The newer request supersedes any older one still in flight.
    pub async fn refetch(&self, descriptor: &QueryDescriptor) -> Result<Arc<Value>, ApiError> {
        let descriptor = Arc::new(descriptor.clone());
        let pending = {
            let mut state = self.lock();
            self.start_request(&mut state, &descriptor, true)
        };
        pending.await
    }

    /// Register a consumer of the query and fetch it if needed.
    ///
    /// # Panics
    ///
    /// Starting a fetch spawns a task, so this must be called from within a
    /// Tokio runtime.
    pub fn subscribe<T: DeserializeOwned>(&self, descriptor: &QueryDescriptor) -> QuerySubscription<T> {
        let descriptor = Arc::new(descriptor.clone());
        let id = descriptor.resource_id();
        let rx = {
            let mut state = self.lock();
            let rx = state.cache.subscribe(&descriptor);
            if self.cached_outcome(&state, &descriptor).is_none() {
                let _ = self.start_request(&mut state, &descriptor, false);
            }
            rx
        };
        debug!(resource = %id, "Subscribed");
        QuerySubscription::new(self.clone(), id, rx)
    }

    pub(crate) fn release(&self, id: &ResourceId) {
        let unused = self.lock().cache.unsubscribe(id);
        if unused {
            debug!(resource = %id, "Last subscriber left");
            self.schedule_collection();
        }
    }

    /// Current state of the query's entry without triggering a fetch.
    pub fn snapshot(&self, descriptor: &QueryDescriptor) -> QuerySnapshot {
        self.lock()
            .cache
            .get(&descriptor.resource_id())
            .map_or_else(QuerySnapshot::idle, CacheEntry::snapshot)
    }

    pub fn cached<T: DeserializeOwned>(&self, descriptor: &QueryDescriptor) -> QueryResult<T> {
        QueryResult::from_snapshot(&self.snapshot(descriptor))
    }

    /// Tags the query's entry is currently filed under.
    pub fn tags_for(&self, descriptor: &QueryDescriptor) -> Vec<Tag> {
        self.lock().tags.tags_for(&descriptor.resource_id())
    }

    /// Mark every entry filed under `tags` stale and refetch the subscribed ones.
    /// Returns the number of entries affected.
    pub fn invalidate_tags(&self, tags: &[Tag]) -> usize {
        let mut state = self.lock();
        self.invalidate_locked(&mut state, tags)
    }

    /// Refetch every entry that currently has subscribers, e.g. after the
    /// connection to the service comes back.
    pub fn refetch_active(&self) -> usize {
        let mut state = self.lock();
        let active = state.cache.active_descriptors();
        for descriptor in &active {
            // Joins a request that is already running
            let _ = self.start_request(&mut state, descriptor, false);
        }
        info!(entries = active.len(), "Refetching active queries");
        active.len()
    }

    /// Evict entries that have had no subscribers for the configured window.
    pub fn collect_garbage(&self) -> Vec<ResourceId> {
        let mut state = self.lock();
        let evicted = state
            .cache
            .evict_unused(self.inner.config.keep_unused_for, Instant::now());
        for id in &evicted {
            state.tags.remove_entry(id);
        }
        evicted
    }

    /// Drop all cached entries, tags, and in-flight bookkeeping.
    ///
    /// Live subscriptions stop receiving updates; requests still running
    /// finish without touching the cleared cache.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.cache.clear();
        state.tags.clear();
        state.in_flight.clear();
        info!("Query cache reset");
    }

    fn cached_outcome(
        &self,
        state: &SyncState,
        descriptor: &QueryDescriptor,
    ) -> Option<Result<Arc<Value>, ApiError>> {
        let id = descriptor.resource_id();
        let entry = state.cache.get(&id)?;
        if entry.is_fresh(self.inner.config.stale_time) {
            debug!(resource = %id, "Cache hit");
            return entry.data().cloned().map(Ok);
        }
        if entry.status() == EntryStatus::Error && !entry.is_stale() && !entry.is_fetching() {
            return entry.error().cloned().map(Err);
        }
        None
    }

    fn start_request(
        &self,
        state: &mut SyncState,
        descriptor: &Arc<QueryDescriptor>,
        force: bool,
    ) -> SharedResult {
        let id = descriptor.resource_id();
        if !force {
            if let Some(in_flight) = state.in_flight.get(&id) {
                debug!(resource = %id, "Joining in-flight request");
                return in_flight.result.clone();
            }
        }

        let request = state.cache.mark_loading(descriptor);
        info!(resource = %id, path = %descriptor.path(), "Fetching");

        let send = self.inner.transport.send(descriptor.request());
        let client = self.clone();
        let task_descriptor = Arc::clone(descriptor);
        let handle = tokio::spawn(async move {
            let mut guard = CompletionGuard {
                client,
                descriptor: task_descriptor,
                request,
                done: false,
            };
            let outcome = send.await;
            guard.done = true;
            guard.client.complete(&guard.descriptor, request, outcome)
        });

        let result = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(ApiError::Network(format!("request task failed: {}", e))))
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            id,
            InFlight {
                request,
                result: result.clone(),
            },
        );
        result
    }

    fn complete(
        &self,
        descriptor: &QueryDescriptor,
        request: RequestId,
        outcome: Result<Value, ApiError>,
    ) -> Result<Arc<Value>, ApiError> {
        let id = descriptor.resource_id();
        let outcome = outcome.map(Arc::new);

        let mut state = self.lock();
        if state
            .in_flight
            .get(&id)
            .is_some_and(|in_flight| in_flight.request == request)
        {
            state.in_flight.remove(&id);
        }

        match &outcome {
            Ok(data) => {
                if state.cache.upsert(&id, request, Arc::clone(data)) {
                    for tag in &descriptor.provides_tags {
                        state.tags.register_provider(tag, id.clone());
                    }
                    debug!(resource = %id, "Stored query result");
                } else {
                    debug!(resource = %id, "Discarding superseded query result");
                }
            }
            Err(error) => {
                if state.cache.mark_error(&id, request, error.clone()) {
                    warn!(resource = %id, error = %error, "Query failed");
                } else {
                    debug!(resource = %id, error = %error, "Discarding superseded query error");
                }
            }
        }

        let unused = state
            .cache
            .get(&id)
            .is_some_and(|entry| entry.subscriber_count() == 0);
        drop(state);
        if unused {
            self.schedule_collection();
        }
        outcome
    }

    fn invalidate_locked(&self, state: &mut SyncState, tags: &[Tag]) -> usize {
        let mut affected = HashSet::new();
        for tag in tags {
            let ids = state.tags.invalidate_tag(tag);
            info!(tag = %tag, entries = ids.len(), "Invalidating tag");
            affected.extend(ids);
        }

        for id in &affected {
            if !state.cache.invalidate(id) {
                continue;
            }
            // Requests started before the invalidation must not be joined.
            state.in_flight.remove(id);

            let active = state
                .cache
                .get(id)
                .filter(|entry| entry.subscriber_count() > 0)
                .map(|entry| Arc::clone(entry.descriptor()));
            if let Some(descriptor) = active {
                let _ = self.start_request(state, &descriptor, true);
            }
        }
        affected.len()
    }

    fn schedule_collection(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner = Arc::downgrade(&self.inner);
        let delay = self.inner.config.keep_unused_for;
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                QueryClient { inner }.collect_garbage();
            }
        });
    }
}
