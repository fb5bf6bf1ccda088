use std::sync::Arc;

use test_kitchen_core::configuration_fetcher::{ConfigurationFetcher, ConfigurationFetcherConfig};
use test_kitchen_core::configuration_store::ConfigurationStore;
use test_kitchen_core::poller_thread::PollerThread as PollerThreadImpl;
#[cfg(doc)]
use test_kitchen_core::Error;

use crate::Result;

pub(crate) struct PollerThreadConfig {
    pub(crate) store: Arc<ConfigurationStore>,
    pub(crate) base_url: String,
}

/// A configuration poller thread.
///
/// The poller thread polls the config service periodically to fetch the latest experiment
/// definitions and instrument configs.
///
/// Use [`Client::start_poller_thread`][crate::Client::start_poller_thread] to get an instance.
///
/// Sessions created before the first configuration is fetched see an empty configuration, so it
/// is recommended to call [`PollerThread::wait_for_configuration`] first.
pub struct PollerThread(PollerThreadImpl);

impl PollerThread {
    pub(crate) fn start(config: PollerThreadConfig) -> Result<PollerThread> {
        let fetcher = ConfigurationFetcher::new(ConfigurationFetcherConfig {
            base_url: config.base_url,
            sdk_name: "test-kitchen-rust".to_owned(),
            sdk_version: env!("CARGO_PKG_VERSION").to_owned(),
        });
        let inner = PollerThreadImpl::start(fetcher, config.store)?;
        Ok(PollerThread(inner))
    }

    /// Waits for the first configuration to be fetched.
    ///
    /// This method blocks until the poller thread has fetched the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::PollerThreadPanicked`] if the poller thread panicked while waiting for
    ///   configuration.
    pub fn wait_for_configuration(&self) -> Result<()> {
        self.0.wait_for_configuration()
    }

    /// Stop the poller thread.
    ///
    /// This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        self.0.stop()
    }

    /// Stop the poller thread and block waiting for it to exit.
    ///
    /// If you need to wait for the thread to stop, prefer this method over calling
    /// [`PollerThread::stop`] followed by `shutdown()`.
    ///
    /// # Errors
    ///
    /// - [`Error::PollerThreadPanicked`] if the poller thread panicked.
    pub fn shutdown(self) -> Result<()> {
        self.0.shutdown()
    }
}
