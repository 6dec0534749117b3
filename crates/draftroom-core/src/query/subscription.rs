//! Reactive view of one cache entry.
//!
//! A [`QuerySubscription`] keeps its entry alive (it counts as a subscriber)
//! and observes every state transition through a watch channel. Typed
//! results are decoded from the cached JSON on read.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::api::ApiError;
use crate::cache::{EntryStatus, QuerySnapshot, ResourceId};

use super::client::QueryClient;

/// The state of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    /// Nothing has been requested yet.
    Idle,
    /// First fetch in progress, no data yet.
    Loading,
    /// Data is available.
    Success {
        data: T,
        /// Whether the data has been invalidated and awaits a refetch.
        is_stale: bool,
    },
    /// The last fetch failed.
    Error(ApiError),
}

/// A typed query result containing the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub state: QueryState<T>,
    /// A request for this entry is outstanding.
    pub is_fetching: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl<T: DeserializeOwned> QueryResult<T> {
    pub fn from_snapshot(snapshot: &QuerySnapshot) -> Self {
        let state = match (snapshot.status, &snapshot.data, &snapshot.error) {
            (EntryStatus::Error, _, Some(error)) => QueryState::Error(error.clone()),
            (_, Some(data), _) => match T::deserialize(&**data) {
                Ok(data) => QueryState::Success {
                    data,
                    is_stale: snapshot.is_stale,
                },
                Err(e) => QueryState::Error(ApiError::from(e)),
            },
            (EntryStatus::Idle, None, _) => QueryState::Idle,
            _ => QueryState::Loading,
        };
        Self {
            state,
            is_fetching: snapshot.is_fetching,
            last_fetched_at: snapshot.last_fetched_at,
        }
    }
}

impl<T> QueryResult<T> {
    /// Returns the data if the query succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            QueryState::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    pub const fn error(&self) -> Option<&ApiError> {
        match &self.state {
            QueryState::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<Result<T, ApiError>> {
        match self.state {
            QueryState::Success { data, .. } => Some(Ok(data)),
            QueryState::Error(error) => Some(Err(error)),
            QueryState::Idle | QueryState::Loading => None,
        }
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self.state, QueryState::Loading)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.state, QueryState::Success { .. })
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.state, QueryState::Error(_))
    }

    pub const fn is_stale(&self) -> bool {
        matches!(self.state, QueryState::Success { is_stale: true, .. })
    }
}

/// Live subscription to one query. Dropping it unsubscribes.
pub struct QuerySubscription<T> {
    client: QueryClient,
    id: ResourceId,
    rx: watch::Receiver<QuerySnapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> QuerySubscription<T> {
    pub(crate) fn new(client: QueryClient, id: ResourceId, rx: watch::Receiver<QuerySnapshot>) -> Self {
        Self {
            client,
            id,
            rx,
            _marker: PhantomData,
        }
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.id
    }

    pub fn snapshot(&self) -> QuerySnapshot {
        self.rx.borrow().clone()
    }
}

impl<T: DeserializeOwned> QuerySubscription<T> {
    pub fn result(&self) -> QueryResult<T> {
        QueryResult::from_snapshot(&self.rx.borrow())
    }

    /// Wait for the next state transition. Returns `None` once the entry is
    /// gone (the client was reset).
    pub async fn changed(&mut self) -> Option<QueryResult<T>> {
        self.rx.changed().await.ok()?;
        Some(QueryResult::from_snapshot(&self.rx.borrow_and_update()))
    }

    /// Wait until no request is outstanding and the entry holds an outcome.
    pub async fn settled(&mut self) -> QueryResult<T> {
        loop {
            let snapshot = self.rx.borrow_and_update().clone();
            if snapshot.is_settled() || self.rx.changed().await.is_err() {
                return QueryResult::from_snapshot(&snapshot);
            }
        }
    }
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        self.client.release(&self.id);
    }
}
