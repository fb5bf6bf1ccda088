use std::sync::Arc;

use test_kitchen_core::configuration_store::ConfigurationStore;
use test_kitchen_core::RequestContext;

use crate::poller::{PollerThread, PollerThreadConfig};
use crate::{ClientConfig, Result, Session};

/// A client for the Test Kitchen config service.
///
/// The client owns the configuration store and the SDK-wide settings; it hands out one
/// [`Session`] per request. In order to create a client instance, first create [`ClientConfig`].
///
/// # Poller thread
///
/// Before creating sessions, you should start the poller thread by calling
/// [`Client::start_poller_thread()`], ensuring that the configuration is fetched. It's also
/// recommended to call [`PollerThread::wait_for_configuration`] before the first session.
/// Sessions created with an empty configuration resolve every experiment and instrument lookup
/// to the no-op handle.
///
/// # Examples
/// ```no_run
/// # use test_kitchen::{Client, ClientConfig};
/// let mut client = ClientConfig::new("en.wikipedia.org").to_client();
/// client.start_poller_thread();
/// ```
pub struct Client {
    configuration_store: Arc<ConfigurationStore>,
    config: ClientConfig,
}

impl Client {
    /// Create a new `Client` using the specified configuration.
    ///
    /// ```
    /// # use test_kitchen::{ClientConfig, Client};
    /// let client = Client::new(ClientConfig::new("en.wikipedia.org"));
    /// ```
    pub fn new(config: ClientConfig) -> Client {
        Client {
            configuration_store: Arc::new(ConfigurationStore::new()),
            config,
        }
    }

    #[cfg(test)]
    fn new_with_configuration_store(
        config: ClientConfig,
        configuration_store: Arc<ConfigurationStore>,
    ) -> Client {
        Client {
            configuration_store,
            config,
        }
    }

    /// Start a poller thread to fetch configuration from the config service periodically.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`](crate::Error::Io) if the poller thread failed to start.
    pub fn start_poller_thread(&mut self) -> Result<PollerThread> {
        PollerThread::start(PollerThreadConfig {
            store: Arc::clone(&self.configuration_store),
            base_url: self.config.base_url.clone(),
        })
    }

    /// Create a [`Session`] for one request.
    ///
    /// The session snapshots the current configuration, so it is unaffected by concurrent
    /// refreshes. Call [`Session::enroll()`] before asking for experiment handles.
    pub fn new_session(&self, context: RequestContext) -> Session {
        let configuration = self.configuration_store.get_configuration().unwrap_or_default();
        Session::new(configuration, context, &self.config)
    }
}
