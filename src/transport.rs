//! Transport seam between the compiled build and the service.
//!
//! [`Transport`] is the single injection point for tests and alternative
//! backends. Its contract: any HTTP response the service produces, success
//! or failure, comes back as `Ok(ApiResponse)` so that status interpretation
//! happens in exactly one place downstream. `Err` is reserved for requests
//! that never completed: connection failures, timeouts, request
//! construction problems, and key resolution failures.

use crate::config::ClientConfig;
use crate::error::Error;
use crate::workflow::input::FilePayload;
use crate::workflow::instructions::Instructions;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Path of the document production endpoint, relative to the base URL.
pub const BUILD_ENDPOINT: &str = "build";

/// Path of the cost/feature analysis endpoint, relative to the base URL.
pub const ANALYZE_ENDPOINT: &str = "analyze_build";

/// One compiled build, ready for the wire.
///
/// `files` pairs each generated reference key with its fully materialized
/// payload, in allocation order.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub endpoint: &'static str,
    pub method: &'static str,
    pub instructions: Instructions,
    pub files: Vec<(String, FilePayload)>,
    /// Per-request override of the configured round-trip budget.
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn build(instructions: Instructions, files: Vec<(String, FilePayload)>) -> Self {
        ApiRequest {
            endpoint: BUILD_ENDPOINT,
            method: "POST",
            instructions,
            files,
            timeout: None,
        }
    }

    pub fn analyze(instructions: Instructions, files: Vec<(String, FilePayload)>) -> Self {
        ApiRequest {
            endpoint: ANALYZE_ENDPOINT,
            method: "POST",
            instructions,
            files,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A completed HTTP exchange, whatever the status was.
///
/// Header names are stored lowercased, matching what reqwest yields.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        ApiResponse {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Dispatches compiled builds to the service.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, Error>;
}

/// Production transport: multipart POST over reqwest.
pub struct HttpTransport {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Create a transport for the given configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::Network {
                reason: format!("failed to construct HTTP client: {e}"),
            })?;

        debug!("HTTP transport ready for {}", config.base_url);
        Ok(HttpTransport { http, config })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let url = self
            .config
            .base_url
            .join(request.endpoint)
            .map_err(|e| Error::InvalidConfig(format!("cannot join endpoint path: {e}")))?;
        let method: reqwest::Method = request
            .method
            .parse()
            .map_err(|_| Error::Internal(format!("bad HTTP method '{}'", request.method)))?;
        let timeout = request.timeout.unwrap_or(self.config.timeout);
        let key = self.config.api_key.resolve().await?;

        // One multipart field per reference key, plus the instruction tree
        // itself as a JSON text field.
        let mut form = Form::new();
        for (reference, payload) in request.files {
            let length = payload.data.len() as u64;
            let mut part =
                Part::stream_with_length(payload.data, length).file_name(payload.filename);
            if let Some(content_type) = &payload.content_type {
                part = part.mime_str(content_type).map_err(|_| {
                    Error::InvalidFileInput {
                        detail: format!("unparseable content type '{content_type}'"),
                    }
                })?;
            }
            form = form.part(reference, part);
        }
        let instructions_json =
            serde_json::to_string(&request.instructions).map_err(|e| {
                Error::Internal(format!("instruction tree failed to serialize: {e}"))
            })?;
        form = form.text("instructions", instructions_json);

        info!("Dispatching {} {}", request.method, request.endpoint);

        let result = self
            .http
            .request(method, url)
            .bearer_auth(key)
            .timeout(timeout)
            .multipart(form)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(Error::Timeout {
                    secs: timeout.as_secs(),
                });
            }
            Err(e) if e.is_connect() => {
                return Err(Error::Network {
                    reason: format!("connection failed: {e}"),
                });
            }
            Err(e) => {
                return Err(Error::Network {
                    reason: e.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }
        let body = response.bytes().await.map_err(|e| Error::Network {
            reason: format!("failed to read response body: {e}"),
        })?;

        debug!(
            "{} {} answered HTTP {status} with {} body bytes",
            request.method,
            request.endpoint,
            body.len()
        );
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_covers_the_2xx_range() {
        assert!(ApiResponse::new(200, "").is_success());
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(199, "").is_success());
        assert!(!ApiResponse::new(300, "").is_success());
        assert!(!ApiResponse::new(401, "").is_success());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = ApiResponse::new(200, "").with_header("Content-Type", "application/pdf");
        assert_eq!(response.header("content-type"), Some("application/pdf"));
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/pdf"));
        assert_eq!(response.header("content-disposition"), None);
    }

    #[test]
    fn request_constructors_pick_the_endpoint() {
        let instructions = Instructions {
            parts: vec![],
            actions: vec![],
            output: None,
        };
        let build = ApiRequest::build(instructions.clone(), vec![]);
        assert_eq!(build.endpoint, "build");
        assert_eq!(build.method, "POST");
        assert_eq!(build.timeout, None);

        let analyze = ApiRequest::analyze(instructions, vec![])
            .with_timeout(Some(Duration::from_secs(5)));
        assert_eq!(analyze.endpoint, "analyze_build");
        assert_eq!(analyze.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn transport_construction_validates_config() {
        let config = ClientConfig::new("sk_test");
        assert!(HttpTransport::new(config).is_ok());

        let bad = ClientConfig::new("  ");
        assert!(HttpTransport::new(bad).is_err());
    }
}
