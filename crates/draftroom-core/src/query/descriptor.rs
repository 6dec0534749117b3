use reqwest::Method;
use serde_json::Value;

use crate::api::Request;
use crate::cache::{ResourceId, Tag};

/// What a query reads and which tags its result is filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub collection: String,
    pub id: String,
    pub params: Vec<(String, String)>,
    pub provides_tags: Vec<Tag>,
}

impl QueryDescriptor {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            params: Vec::new(),
            provides_tags: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn provides(mut self, tag: Tag) -> Self {
        self.provides_tags.push(tag);
        self
    }

    /// Cache key; parameters are sorted so declaration order never matters.
    /// The id and every key and value are percent-encoded, so distinct
    /// parameter sets can never collide.
    pub fn resource_id(&self) -> ResourceId {
        let id = urlencoding::encode(&self.id);
        if self.params.is_empty() {
            return ResourceId::new(&self.collection, id);
        }
        let mut params = self.params.clone();
        params.sort();
        let query = params
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");
        ResourceId::new(&self.collection, format!("{}?{}", id, query))
    }

    pub fn path(&self) -> String {
        resource_path(&self.collection, &self.id, None)
    }

    pub fn request(&self) -> Request {
        Request::get(self.path()).with_params(&self.params)
    }
}

/// What a mutation writes and which tags become stale once it succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationDescriptor {
    pub method: Method,
    pub collection: String,
    pub id: String,
    /// Trailing path segment, e.g. `pick` in `/draft/123/pick`
    pub action: Option<String>,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    pub invalidates_tags: Vec<Tag>,
}

impl MutationDescriptor {
    pub fn new(method: Method, collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            method,
            collection: collection.into(),
            id: id.into(),
            action: None,
            params: Vec::new(),
            body: None,
            invalidates_tags: Vec::new(),
        }
    }

    pub fn post(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(Method::POST, collection, id)
    }

    pub fn put(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(Method::PUT, collection, id)
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn invalidates(mut self, tag: Tag) -> Self {
        self.invalidates_tags.push(tag);
        self
    }

    pub fn path(&self) -> String {
        resource_path(&self.collection, &self.id, self.action.as_deref())
    }

    pub fn request(&self) -> Request {
        let request = Request::new(self.method.clone(), self.path()).with_params(&self.params);
        match &self.body {
            Some(body) => request.with_body(body.clone()),
            None => request,
        }
    }
}

fn resource_path(collection: &str, id: &str, action: Option<&str>) -> String {
    [Some(collection), Some(id), action]
        .into_iter()
        .flatten()
        .filter(|segment| !segment.is_empty())
        .fold(String::new(), |mut path, segment| {
            path.push('/');
            path.push_str(segment);
            path
        })
}
