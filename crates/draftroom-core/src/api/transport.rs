//! Request/response boundary to the remote draft service.
//!
//! `Transport` is the seam the query and mutation executors call through.
//! `HttpTransport` is the production implementation on top of reqwest; tests
//! use [`MockTransport`](super::mock::MockTransport). No retries happen here:
//! a failed call is reported once and retry policy belongs to the caller.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::{header, Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;

use super::ApiError;

/// A single request against the draft service, relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn with_params(mut self, params: &[(String, String)]) -> Self {
        self.params.extend(params.iter().cloned());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Issues requests and yields the decoded JSON response.
///
/// The returned future owns everything it needs so executors can move it
/// onto a spawned task.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Value, ApiError>>;
}

/// reqwest-backed transport bound to one base URL.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    headers: header::HeaderMap,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        reqwest::Url::parse(&config.base_url)
            .with_context(|| format!("Invalid base URL: {}", config.base_url))?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(config.credentials.uses_cookies())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            headers: Self::shared_headers(config)?,
        })
    }

    /// Headers attached to every request, computed once from configuration.
    fn shared_headers(config: &ClientConfig) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        for (name, value) in &config.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name: {}", name))?;
            let value = header::HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            headers.insert(name, value);
        }
        if let (Some(token), true) = (&config.token, config.credentials.sends_token()) {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Invalid bearer token")?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}

/// Decode a response body; endpoints that answer with no body yield `null`.
pub(crate) fn decode_body(bytes: &[u8]) -> Result<Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Value, ApiError>> {
        let client = self.client.clone();
        let headers = self.headers.clone();
        let url = self.url(&request.path);

        Box::pin(async move {
            debug!(method = %request.method, url = %url, "Sending request");

            let mut builder = client.request(request.method, &url).headers(headers);
            if !request.params.is_empty() {
                builder = builder.query(&request.params);
            }
            if let Some(body) = request.body {
                builder = builder.json(&body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            let response = Self::check_response(response).await?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            decode_body(&bytes)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialsMode;
    use serde_json::json;

    fn config_with_token(mode: CredentialsMode) -> ClientConfig {
        ClientConfig {
            token: Some("secret".to_string()),
            credentials: mode,
            ..ClientConfig::new("https://draft.example.com/api/")
        }
    }

    #[test]
    fn test_request_builders() {
        let request = Request::post("/draft/123/pick").with_param("name", "Alice");
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/draft/123/pick");
        assert_eq!(request.params, vec![("name".to_string(), "Alice".to_string())]);
        assert!(request.body.is_none());

        let request = Request::put("/league/7").with_body(json!({"teams": []}));
        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.body, Some(json!({"teams": []})));
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let transport =
            HttpTransport::new(&ClientConfig::new("https://draft.example.com/api/")).unwrap();
        assert_eq!(
            transport.url("/draft/123"),
            "https://draft.example.com/api/draft/123"
        );
        assert_eq!(
            transport.url("draft/123"),
            "https://draft.example.com/api/draft/123"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(HttpTransport::new(&ClientConfig::new("not a url")).is_err());
    }

    #[test]
    fn test_shared_headers_attach_token_unless_omitted() {
        let headers = HttpTransport::shared_headers(&config_with_token(CredentialsMode::Include))
            .unwrap();
        assert_eq!(
            headers.get(header::AUTHORIZATION).unwrap(),
            "Bearer secret"
        );
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "application/json");

        let headers =
            HttpTransport::shared_headers(&config_with_token(CredentialsMode::Omit)).unwrap();
        assert!(headers.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_shared_headers_include_custom_headers() {
        let mut config = ClientConfig::default();
        config
            .headers
            .insert("X-Draft-Client".to_string(), "cli".to_string());
        let headers = HttpTransport::shared_headers(&config).unwrap();
        assert_eq!(headers.get("x-draft-client").unwrap(), "cli");

        config
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(HttpTransport::shared_headers(&config).is_err());
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(b"").unwrap(), Value::Null);
        assert_eq!(decode_body(b"  \n").unwrap(), Value::Null);
        assert_eq!(
            decode_body(br#"{"id":"123","picks":[]}"#).unwrap(),
            json!({"id": "123", "picks": []})
        );
        assert!(matches!(decode_body(b"<html>"), Err(ApiError::Decode(_))));
    }
}
