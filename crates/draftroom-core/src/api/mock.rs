//! Scriptable transport for testing.
//!
//! `MockTransport` answers requests from per-route scripts and records every
//! call it sees, so tests can assert exactly how many network requests the
//! executors issued. Replies can also be held back until the test releases
//! them, which makes completion order deterministic.
//!
//! ```
//! use draftroom_core::api::mock::MockTransport;
//! use reqwest::Method;
//! use serde_json::json;
//!
//! let mock = MockTransport::new();
//! mock.respond(Method::GET, "/draft/123", Ok(json!({"id": "123", "picks": []})));
//! assert_eq!(mock.call_count(&Method::GET, "/draft/123"), 0);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::oneshot;

use super::{ApiError, Request, Transport};

type Reply = Result<Value, ApiError>;

enum Scripted {
    Ready(Reply),
    Held(oneshot::Receiver<Reply>),
}

#[derive(Default)]
struct Route {
    queued: VecDeque<Scripted>,
    fallback: Option<Reply>,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<(Method, String), Route>,
    calls: Vec<Request>,
}

/// In-memory transport with scripted replies.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_route<R>(&self, method: Method, path: &str, f: impl FnOnce(&mut Route) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let route = state.routes.entry((method, path.to_string())).or_default();
        f(route)
    }

    /// Answer every request to this route with `reply` once queued replies run out.
    pub fn respond(&self, method: Method, path: &str, reply: Reply) {
        self.with_route(method, path, |route| route.fallback = Some(reply));
    }

    /// Answer the next request to this route with `reply`.
    pub fn respond_once(&self, method: Method, path: &str, reply: Reply) {
        self.with_route(method, path, |route| {
            route.queued.push_back(Scripted::Ready(reply))
        });
    }

    /// Hold the next request to this route until the returned sender fires.
    ///
    /// Dropping the sender fails the request with a network error.
    pub fn respond_later(&self, method: Method, path: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.with_route(method, path, |route| route.queued.push_back(Scripted::Held(rx)));
        tx
    }

    /// Every request seen so far, in call order.
    pub fn calls(&self) -> Vec<Request> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.calls.clone()
    }

    pub fn call_count(&self, method: &Method, path: &str) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .calls
            .iter()
            .filter(|call| &call.method == method && call.path == path)
            .count()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Value, ApiError>> {
        let scripted = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.calls.push(request.clone());
            let key = (request.method.clone(), request.path.clone());
            match state.routes.get_mut(&key) {
                Some(route) => match route.queued.pop_front() {
                    Some(scripted) => scripted,
                    None => Scripted::Ready(route.fallback.clone().unwrap_or_else(|| {
                        Err(ApiError::Http {
                            status: 404,
                            body: format!("no scripted reply for {} {}", key.0, key.1),
                        })
                    })),
                },
                None => Scripted::Ready(Err(ApiError::Http {
                    status: 404,
                    body: format!("no scripted reply for {} {}", key.0, key.1),
                })),
            }
        };

        Box::pin(async move {
            match scripted {
                Scripted::Ready(reply) => reply,
                Scripted::Held(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(ApiError::Network("mock reply dropped".to_string()))),
            }
        })
    }
}
