use std::sync::Arc;

use test_kitchen_core::events::{ExecutionContext, FlushScheduler, NoopScheduler, Transport};
use test_kitchen_core::sdk::StreamConfigs;

use crate::{transport::HttpTransport, Client};

/// Configuration for [`Client`].
///
/// # Examples
/// ```
/// # use test_kitchen::ClientConfig;
/// let client = ClientConfig::new("en.wikipedia.org").to_client();
/// ```
pub struct ClientConfig {
    pub(crate) domain: String,
    pub(crate) base_url: String,
    pub(crate) execution_context: ExecutionContext,
    pub(crate) stream_configs: Arc<StreamConfigs>,
    pub(crate) transport: Arc<dyn Transport + Send + Sync>,
    pub(crate) scheduler: Arc<dyn FlushScheduler + Send + Sync>,
}

impl ClientConfig {
    /// Default base URL for config service calls.
    pub const DEFAULT_BASE_URL: &'static str = "https://mpic.wikimedia.org/api/v1";

    /// Default URL events are delivered to.
    pub const DEFAULT_INTAKE_URL: &'static str = "https://intake-analytics.wikimedia.org/v1/events";

    /// Create a default configuration for the given deployment domain. The domain is stamped
    /// into the `meta.domain` field of every event.
    pub fn new(domain: impl Into<String>) -> Self {
        ClientConfig {
            domain: domain.into(),
            base_url: ClientConfig::DEFAULT_BASE_URL.to_owned(),
            execution_context: ExecutionContext::Batch,
            stream_configs: Arc::new(StreamConfigs::default()),
            transport: Arc::new(HttpTransport::new(
                ClientConfig::DEFAULT_INTAKE_URL.to_owned(),
            )),
            scheduler: Arc::new(NoopScheduler),
        }
    }

    /// Override base URL for config service calls. Clients should use the default setting in
    /// most cases.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the execution context. In [`ExecutionContext::Interactive`], events are queued and
    /// flushed in deferred batches through the configured scheduler; in
    /// [`ExecutionContext::Batch`] (the default, suitable for CLI and job runners) every event
    /// is delivered immediately and synchronously.
    pub fn execution_context(mut self, execution_context: ExecutionContext) -> Self {
        self.execution_context = execution_context;
        self
    }

    /// Replace the stream registry, which declares the contextual attributes each stream's
    /// events carry.
    pub fn stream_configs(mut self, stream_configs: StreamConfigs) -> Self {
        self.stream_configs = Arc::new(stream_configs);
        self
    }

    /// Replace the event transport. The default posts event batches to the intake service over
    /// HTTP.
    pub fn transport(mut self, transport: impl Transport + Send + Sync + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Set the flush scheduler used in interactive execution contexts. The scheduler owns the
    /// actual timer and must call [`Session::flush`](crate::Session::flush) once the delay
    /// elapses; the default scheduler does nothing, leaving delivery to the teardown hook.
    pub fn scheduler(mut self, scheduler: impl FlushScheduler + Send + Sync + 'static) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Create a new [`Client`] using the specified configuration.
    ///
    /// ```
    /// # use test_kitchen::{ClientConfig, Client};
    /// let client: Client = ClientConfig::new("en.wikipedia.org").to_client();
    /// ```
    pub fn to_client(self) -> Client {
        Client::new(self)
    }
}
