//! Client configuration.
//!
//! Everything the client needs to reach the service lives in
//! [`ClientConfig`], built via its [`ClientConfigBuilder`]. The API key is
//! the one field without a default, so the builder takes it up front;
//! all other knobs have documented defaults.
//!
//! Keys never appear in `Debug` output. [`ApiKey`] has a hand-written
//! `Debug` impl precisely so that configs can be logged without leaking
//! credentials.

use crate::error::Error;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Production endpoint of the document build service.
pub static DEFAULT_BASE_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("https://api.docforge.io/v1/").unwrap());

/// Default transport round-trip budget. Default: 60 s.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default budget for fetching a remote input URL. Default: 120 s.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

fn default_user_agent() -> String {
    format!("docforge/{}", env!("CARGO_PKG_VERSION"))
}

/// Supplies an API key immediately before each request.
///
/// Implement this when keys rotate at runtime (short-lived tokens fetched
/// from a secret store). For a fixed key, `ApiKey::from("sk_...")`
/// is all that is needed.
#[async_trait]
pub trait ApiKeyResolver: Send + Sync {
    async fn resolve(&self) -> Result<String, Error>;
}

/// Credential for the service: a fixed key or a per-request resolver.
#[derive(Clone)]
pub enum ApiKey {
    Static(String),
    Resolver(Arc<dyn ApiKeyResolver>),
}

impl ApiKey {
    /// Produce the key to attach to the next request.
    pub async fn resolve(&self) -> Result<String, Error> {
        match self {
            ApiKey::Static(key) => Ok(key.clone()),
            ApiKey::Resolver(resolver) => resolver.resolve().await,
        }
    }
}

// The key material must never reach logs or error chains.
impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKey::Static(_) => f.write_str("ApiKey::Static(<redacted>)"),
            ApiKey::Resolver(_) => f.write_str("ApiKey::Resolver(<dyn ApiKeyResolver>)"),
        }
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        ApiKey::Static(key.to_string())
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        ApiKey::Static(key)
    }
}

impl From<Arc<dyn ApiKeyResolver>> for ApiKey {
    fn from(resolver: Arc<dyn ApiKeyResolver>) -> Self {
        ApiKey::Resolver(resolver)
    }
}

/// Configuration for a [`Client`](crate::Client).
///
/// # Example
/// ```rust
/// use docforge::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder("sk_test_key")
///     .timeout(Duration::from_secs(30))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Credential attached to every request as a bearer token.
    pub api_key: ApiKey,

    /// Service root; endpoint paths are joined onto it. Default:
    /// [`DEFAULT_BASE_URL`]. Must be http(s) and end with a trailing slash
    /// for the join to preserve its path.
    pub base_url: Url,

    /// Transport round-trip budget per request. Default: 60 s.
    ///
    /// A timeout stops the client waiting; it does not retract work the
    /// server has already started.
    pub timeout: Duration,

    /// Budget for eagerly fetching a remote input URL. Default: 120 s.
    ///
    /// Separate from `timeout` because input downloads are typically much
    /// larger than the instruction round-trip.
    pub fetch_timeout: Duration,

    /// `User-Agent` header value. Default: `docforge/<version>`.
    pub user_agent: String,
}

impl ClientConfig {
    /// Configuration with the given key and defaults for everything else.
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        ClientConfig {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.clone(),
            timeout: DEFAULT_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: default_user_agent(),
        }
    }

    /// Create a new builder seeded with the given key.
    pub fn builder(api_key: impl Into<ApiKey>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::new(api_key),
        }
    }

    /// Check invariants the transport relies on.
    pub fn validate(&self) -> Result<(), Error> {
        if let ApiKey::Static(key) = &self.api_key {
            if key.trim().is_empty() {
                return Err(Error::InvalidConfig("API key must not be empty".into()));
            }
        }
        match self.base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::InvalidConfig(format!(
                    "base URL scheme must be http or https, got '{other}'"
                )));
            }
        }
        if self.base_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig(
                "base URL cannot serve as a base for endpoint paths".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be non-zero".into()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(Error::InvalidConfig("fetch timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: Url) -> Self {
        self.config.base_url = url;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn key_resolver(mut self, resolver: Arc<dyn ApiKeyResolver>) -> Self {
        self.config.api_key = ApiKey::Resolver(resolver);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, Error> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ClientConfig::new("sk_test");
        assert_eq!(config.base_url.as_str(), "https://api.docforge.io/v1/");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.fetch_timeout, Duration::from_secs(120));
        assert!(config.user_agent.starts_with("docforge/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::builder("sk_test")
            .base_url(Url::parse("http://localhost:5000/api/").unwrap())
            .timeout(Duration::from_secs(5))
            .user_agent("custom/1.0")
            .build()
            .unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:5000/api/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "custom/1.0");
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = ClientConfig::builder("   ").build().unwrap_err();
        assert!(err.to_string().contains("API key"));
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let err = ClientConfig::builder("sk_test")
            .base_url(Url::parse("ftp://files.example.com/").unwrap())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ClientConfig::builder("sk_test")
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn debug_never_prints_the_key() {
        let config = ClientConfig::new("sk_live_supersecret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("supersecret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn static_key_resolves_to_itself() {
        let key = ApiKey::from("sk_abc".to_string());
        assert_eq!(key.resolve().await.unwrap(), "sk_abc");
    }

    #[tokio::test]
    async fn resolver_runs_per_call() {
        use std::sync::atomic::{AtomicU32, Ordering};

        #[derive(Default)]
        struct Counting(AtomicU32);

        #[async_trait]
        impl ApiKeyResolver for Counting {
            async fn resolve(&self) -> Result<String, Error> {
                let n = self.0.fetch_add(1, Ordering::SeqCst);
                Ok(format!("token_{n}"))
            }
        }

        let key = ApiKey::Resolver(Arc::new(Counting::default()));
        assert_eq!(key.resolve().await.unwrap(), "token_0");
        assert_eq!(key.resolve().await.unwrap(), "token_1");
    }
}
