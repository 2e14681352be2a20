//! Client handle for the document build service.

use crate::config::ClientConfig;
use crate::error::Error;
use crate::transport::{HttpTransport, Transport};
use crate::workflow::builder::{stage, WorkflowBuilder};
use std::fmt;
use std::sync::Arc;

/// Inner state shared by every clone of a [`Client`].
struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ClientInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientInner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Entry point: holds the configuration and transport, hands out workflows.
///
/// Cloning is cheap (one `Arc` bump); clones share the underlying HTTP
/// connection pool.
///
/// # Examples
///
/// ```rust,no_run
/// use docforge::{Client, ExecuteOptions};
///
/// # async fn run() -> Result<(), docforge::Error> {
/// let client = Client::with_key("sk_live_example")?;
/// let result = client
///     .workflow()
///     .add_file_part("intro.pdf")
///     .add_file_part("appendix.pdf")
///     .output_pdf()
///     .execute(ExecuteOptions::default())
///     .await?;
/// assert!(result.success);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a client over the production HTTP transport.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let transport = HttpTransport::new(config.clone())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client from an API key with default configuration.
    pub fn with_key(api_key: impl Into<crate::config::ApiKey>) -> Result<Self, Error> {
        Self::new(ClientConfig::new(api_key))
    }

    /// Create a client over a caller-supplied transport.
    ///
    /// The configuration is used as given; validation is up to the caller.
    /// This is the seam test suites and alternative backends plug into.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Client {
            inner: Arc::new(ClientInner { config, transport }),
        }
    }

    /// The configuration this client runs with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    /// Start a new build workflow.
    pub fn workflow(&self) -> WorkflowBuilder<stage::Empty> {
        WorkflowBuilder::new(self.clone())
    }
}
