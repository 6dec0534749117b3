//! Client configuration supplied once at process start.
//!
//! `ClientConfig` carries everything the transport and the query executor
//! need: the base URL of the draft service, shared request options, and the
//! cache timing knobs. It deserializes from JSON with every field defaulted.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default base URL for a locally running draft service
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How long an entry with no subscribers is kept before eviction.
const DEFAULT_KEEP_UNUSED_FOR_SECS: u64 = 60;

/// Which credentials are attached to outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsMode {
    /// Never send the token or cookies.
    Omit,
    /// Send the bearer token to the configured service only.
    #[default]
    SameOrigin,
    /// Send the bearer token and keep a cookie store across requests.
    Include,
}

impl CredentialsMode {
    pub fn sends_token(self) -> bool {
        !matches!(self, CredentialsMode::Omit)
    }

    pub fn uses_cookies(self) -> bool {
        matches!(self, CredentialsMode::Include)
    }
}

impl std::str::FromStr for CredentialsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "omit" => Ok(CredentialsMode::Omit),
            "same-origin" | "same_origin" | "sameorigin" => Ok(CredentialsMode::SameOrigin),
            "include" => Ok(CredentialsMode::Include),
            other => Err(format!("unknown credentials mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub credentials: CredentialsMode,
    pub token: Option<String>,
    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
    pub request_timeout_secs: u64,
    /// Age after which a successful entry is refetched; `None` keeps data
    /// fresh until a tag invalidates it.
    pub stale_time_secs: Option<u64>,
    pub keep_unused_for_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: CredentialsMode::default(),
            token: None,
            headers: BTreeMap::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            stale_time_secs: None,
            keep_unused_for_secs: DEFAULT_KEEP_UNUSED_FOR_SECS,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            stale_time: self.stale_time_secs.map(Duration::from_secs),
            keep_unused_for: Duration::from_secs(self.keep_unused_for_secs),
        }
    }
}

/// Timing configuration for the query executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// How long data is considered fresh after it was fetched.
    ///
    /// `None` means data never ages on its own and only becomes stale when a
    /// tag it is filed under gets invalidated.
    pub stale_time: Option<Duration>,

    /// How long an entry without subscribers survives before it is evicted.
    pub keep_unused_for: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: None,
            keep_unused_for: Duration::from_secs(DEFAULT_KEEP_UNUSED_FOR_SECS),
        }
    }
}

impl QueryConfig {
    #[must_use]
    pub const fn new(stale_time: Option<Duration>, keep_unused_for: Duration) -> Self {
        Self {
            stale_time,
            keep_unused_for,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.credentials, CredentialsMode::SameOrigin);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));

        let query = config.query_config();
        assert_eq!(query.stale_time, None);
        assert_eq!(query.keep_unused_for, Duration::from_secs(60));
        assert_eq!(query, QueryConfig::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"base_url": "https://draft.example.com/api", "credentials": "include", "stale_time_secs": 30}"#,
        )
        .expect("config should parse");
        assert_eq!(config.base_url, "https://draft.example.com/api");
        assert_eq!(config.credentials, CredentialsMode::Include);
        assert_eq!(config.keep_unused_for_secs, DEFAULT_KEEP_UNUSED_FOR_SECS);
        assert_eq!(
            config.query_config().stale_time,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_credentials_mode_from_str() {
        assert_eq!("omit".parse(), Ok(CredentialsMode::Omit));
        assert_eq!("Same-Origin".parse(), Ok(CredentialsMode::SameOrigin));
        assert_eq!(" include ".parse(), Ok(CredentialsMode::Include));
        assert!("always".parse::<CredentialsMode>().is_err());
    }

    #[test]
    fn test_credentials_mode_flags() {
        assert!(!CredentialsMode::Omit.sends_token());
        assert!(CredentialsMode::SameOrigin.sends_token());
        assert!(!CredentialsMode::SameOrigin.uses_cookies());
        assert!(CredentialsMode::Include.uses_cookies());
    }
}
