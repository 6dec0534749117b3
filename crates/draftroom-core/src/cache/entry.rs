use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::api::ApiError;
use crate::query::QueryDescriptor;

/// Address of one cacheable entity, e.g. `("draft", "123")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub collection: String,
    pub id: String,
}

impl ResourceId {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Token identifying one started request; later requests compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RequestId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Point-in-time view of a cache entry, as published to subscribers.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    pub status: EntryStatus,
    pub data: Option<Arc<Value>>,
    pub error: Option<ApiError>,
    pub is_stale: bool,
    pub is_fetching: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl QuerySnapshot {
    pub fn idle() -> Self {
        Self {
            status: EntryStatus::Idle,
            data: None,
            error: None,
            is_stale: false,
            is_fetching: false,
            last_fetched_at: None,
        }
    }

    /// No request is outstanding and the entry holds an outcome.
    pub fn is_settled(&self) -> bool {
        !self.is_fetching && matches!(self.status, EntryStatus::Success | EntryStatus::Error)
    }

    pub fn age_display(&self) -> String {
        age_display(self.last_fetched_at)
    }
}

fn age_minutes(last_fetched_at: Option<DateTime<Utc>>) -> Option<i64> {
    last_fetched_at.map(|fetched| (Utc::now() - fetched).num_minutes())
}

/// Human-readable age of a fetch, e.g. "5m ago".
fn age_display(last_fetched_at: Option<DateTime<Utc>>) -> String {
    let Some(minutes) = age_minutes(last_fetched_at) else {
        return "never".to_string();
    };
    if minutes < 1 {
        // Clock skew lands here too
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

/// One entry of the entity cache.
///
/// Data stays in place when the entry is invalidated or refetched, so the
/// last known good value remains readable until a newer one replaces it.
#[derive(Debug)]
pub struct CacheEntry {
    status: EntryStatus,
    data: Option<Arc<Value>>,
    error: Option<ApiError>,
    last_fetched_at: Option<DateTime<Utc>>,
    fetched_instant: Option<Instant>,
    stale: bool,
    subscriber_count: usize,
    unused_since: Option<Instant>,
    /// Most recently started request.
    latest_request: RequestId,
    /// Most recently started request whose outcome has been applied.
    completed_request: RequestId,
    /// Outcomes of requests up to this one may predate an invalidation.
    stale_through: RequestId,
    descriptor: Arc<QueryDescriptor>,
    notify: watch::Sender<QuerySnapshot>,
}

impl CacheEntry {
    pub(crate) fn new(descriptor: Arc<QueryDescriptor>) -> Self {
        let (notify, _) = watch::channel(QuerySnapshot::idle());
        Self {
            status: EntryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            fetched_instant: None,
            stale: false,
            subscriber_count: 0,
            unused_since: Some(Instant::now()),
            latest_request: RequestId::default(),
            completed_request: RequestId::default(),
            stale_through: RequestId::default(),
            descriptor,
            notify,
        }
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn data(&self) -> Option<&Arc<Value>> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.last_fetched_at
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_fetching(&self) -> bool {
        self.latest_request > self.completed_request
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    pub fn descriptor(&self) -> &Arc<QueryDescriptor> {
        &self.descriptor
    }

    /// Successful, not invalidated, and younger than `stale_time` if one is set.
    pub fn is_fresh(&self, stale_time: Option<Duration>) -> bool {
        if self.status != EntryStatus::Success || self.stale || self.data.is_none() {
            return false;
        }
        match (stale_time, self.fetched_instant) {
            (None, _) => true,
            (Some(limit), Some(fetched)) => fetched.elapsed() <= limit,
            (Some(_), None) => false,
        }
    }

    pub fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_stale: self.stale,
            is_fetching: self.is_fetching(),
            last_fetched_at: self.last_fetched_at,
        }
    }

    pub fn age_display(&self) -> String {
        age_display(self.last_fetched_at)
    }

    pub(crate) fn watch(&self) -> watch::Receiver<QuerySnapshot> {
        self.notify.subscribe()
    }

    pub(crate) fn publish(&self) {
        self.notify.send_replace(self.snapshot());
    }

    pub(crate) fn begin(&mut self, request: RequestId) {
        self.latest_request = request;
        self.status = EntryStatus::Loading;
        self.publish();
    }

    /// Returns false when a newer request has already completed.
    pub(crate) fn apply_success(&mut self, request: RequestId, data: Arc<Value>) -> bool {
        if request <= self.completed_request {
            return false;
        }
        self.completed_request = request;
        self.data = Some(data);
        self.error = None;
        self.last_fetched_at = Some(Utc::now());
        self.fetched_instant = Some(Instant::now());
        self.stale = request <= self.stale_through;
        self.status = self.settled_status(EntryStatus::Success);
        self.touch_unused();
        self.publish();
        true
    }

    /// Returns false when a newer request has already completed.
    pub(crate) fn apply_error(&mut self, request: RequestId, error: ApiError) -> bool {
        if request <= self.completed_request {
            return false;
        }
        self.completed_request = request;
        self.error = Some(error);
        self.status = self.settled_status(EntryStatus::Error);
        self.touch_unused();
        self.publish();
        true
    }

    fn settled_status(&self, outcome: EntryStatus) -> EntryStatus {
        if self.is_fetching() {
            EntryStatus::Loading
        } else {
            outcome
        }
    }

    fn touch_unused(&mut self) {
        if self.subscriber_count == 0 {
            self.unused_since = Some(Instant::now());
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.stale = true;
        self.stale_through = self.latest_request;
        self.publish();
    }

    pub(crate) fn add_subscriber(&mut self) {
        self.subscriber_count += 1;
        self.unused_since = None;
    }

    /// Returns true when the last subscriber left.
    pub(crate) fn remove_subscriber(&mut self) -> bool {
        self.subscriber_count = self.subscriber_count.saturating_sub(1);
        if self.subscriber_count == 0 {
            self.unused_since = Some(Instant::now());
            true
        } else {
            false
        }
    }

    pub(crate) fn is_collectable(&self, keep_unused_for: Duration, now: Instant) -> bool {
        self.subscriber_count == 0
            && !self.is_fetching()
            && self
                .unused_since
                .is_some_and(|since| now.saturating_duration_since(since) >= keep_unused_for)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> CacheEntry {
        CacheEntry::new(Arc::new(QueryDescriptor::new("draft", "123")))
    }

    #[test]
    fn test_new_entry_is_idle() {
        let entry = entry();
        assert_eq!(entry.status(), EntryStatus::Idle);
        assert!(entry.data().is_none());
        assert!(!entry.is_fetching());
        assert!(!entry.is_fresh(None));
        assert_eq!(entry.age_display(), "never");
    }

    #[test]
    fn test_success_after_begin() {
        let mut entry = entry();
        entry.begin(RequestId(1));
        assert_eq!(entry.status(), EntryStatus::Loading);
        assert!(entry.is_fetching());

        assert!(entry.apply_success(RequestId(1), Arc::new(json!({"id": "123"}))));
        assert_eq!(entry.status(), EntryStatus::Success);
        assert_eq!(entry.data().map(|d| d.as_ref()), Some(&json!({"id": "123"})));
        assert!(entry.is_fresh(None));
        assert_eq!(entry.age_display(), "just now");
    }

    #[test]
    fn test_older_completion_discarded_after_newer() {
        let mut entry = entry();
        entry.begin(RequestId(1));
        entry.begin(RequestId(2));

        assert!(entry.apply_success(RequestId(2), Arc::new(json!("newer"))));
        assert!(!entry.apply_success(RequestId(1), Arc::new(json!("older"))));
        assert_eq!(entry.data().map(|d| d.as_ref()), Some(&json!("newer")));
        assert!(!entry.apply_error(RequestId(1), ApiError::Network("late".into())));
        assert!(entry.error().is_none());
    }

    #[test]
    fn test_older_completion_applies_while_newer_pending() {
        let mut entry = entry();
        entry.begin(RequestId(1));
        entry.begin(RequestId(2));

        assert!(entry.apply_success(RequestId(1), Arc::new(json!("older"))));
        assert_eq!(entry.status(), EntryStatus::Loading);
        assert!(entry.is_fetching());

        assert!(entry.apply_success(RequestId(2), Arc::new(json!("newer"))));
        assert_eq!(entry.status(), EntryStatus::Success);
        assert_eq!(entry.data().map(|d| d.as_ref()), Some(&json!("newer")));
    }

    #[test]
    fn test_invalidate_keeps_data() {
        let mut entry = entry();
        entry.begin(RequestId(1));
        entry.apply_success(RequestId(1), Arc::new(json!(1)));

        entry.invalidate();
        assert!(entry.is_stale());
        assert!(!entry.is_fresh(None));
        assert_eq!(entry.status(), EntryStatus::Success);
        assert_eq!(entry.data().map(|d| d.as_ref()), Some(&json!(1)));
    }

    #[test]
    fn test_request_started_before_invalidation_stays_stale() {
        let mut entry = entry();
        entry.begin(RequestId(1));
        entry.invalidate();
        entry.apply_success(RequestId(1), Arc::new(json!("pre-mutation")));
        assert!(entry.is_stale());

        entry.begin(RequestId(2));
        entry.apply_success(RequestId(2), Arc::new(json!("post-mutation")));
        assert!(!entry.is_stale());
        assert!(entry.is_fresh(None));
    }

    #[test]
    fn test_error_keeps_last_good_data() {
        let mut entry = entry();
        entry.begin(RequestId(1));
        entry.apply_success(RequestId(1), Arc::new(json!("good")));
        entry.begin(RequestId(2));
        entry.apply_error(
            RequestId(2),
            ApiError::Http {
                status: 500,
                body: String::new(),
            },
        );

        assert_eq!(entry.status(), EntryStatus::Error);
        assert_eq!(entry.error().and_then(ApiError::status), Some(500));
        assert_eq!(entry.data().map(|d| d.as_ref()), Some(&json!("good")));
    }

    #[test]
    fn test_fresh_respects_stale_time() {
        let mut entry = entry();
        entry.begin(RequestId(1));
        entry.apply_success(RequestId(1), Arc::new(json!(1)));
        entry.fetched_instant = Some(Instant::now() - Duration::from_secs(120));

        assert!(entry.is_fresh(None));
        assert!(entry.is_fresh(Some(Duration::from_secs(300))));
        assert!(!entry.is_fresh(Some(Duration::from_secs(60))));
    }

    #[test]
    fn test_age_display() {
        let mut entry = entry();
        entry.last_fetched_at = Some(Utc::now() - chrono::Duration::minutes(5));
        assert_eq!(entry.age_display(), "5m ago");
        entry.last_fetched_at = Some(Utc::now() - chrono::Duration::minutes(95));
        assert_eq!(entry.age_display(), "2h ago");
        entry.last_fetched_at = Some(Utc::now() - chrono::Duration::hours(26));
        assert_eq!(entry.age_display(), "1d ago");
    }

    #[test]
    fn test_subscribers_and_collectability() {
        let mut entry = entry();
        let keep = Duration::from_secs(60);
        let now = Instant::now();
        assert!(!entry.is_collectable(keep, now));
        assert!(entry.is_collectable(keep, now + keep));

        entry.add_subscriber();
        entry.add_subscriber();
        assert!(!entry.is_collectable(keep, now + keep * 2));
        assert!(!entry.remove_subscriber());
        assert!(entry.remove_subscriber());
        assert_eq!(entry.subscriber_count(), 0);
        assert!(entry.is_collectable(keep, Instant::now() + keep));
    }

    #[test]
    fn test_watch_receives_published_state() {
        let mut entry = entry();
        let rx = entry.watch();
        entry.begin(RequestId(1));
        assert_eq!(rx.borrow().status, EntryStatus::Loading);
        assert!(rx.borrow().is_fetching);

        entry.apply_success(RequestId(1), Arc::new(json!(true)));
        let snapshot = rx.borrow().clone();
        assert!(snapshot.is_settled());
        assert_eq!(snapshot.data.as_deref(), Some(&json!(true)));
    }
}
