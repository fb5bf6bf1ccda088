//! An HTTP client that fetches configuration from the config service.
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::{Configuration, Error, Result, TryParse};

pub struct ConfigurationFetcherConfig {
    pub base_url: String,
    /// SDK name. Usually, language name.
    pub sdk_name: String,
    /// Version of SDK.
    pub sdk_version: String,
}

pub const DEFAULT_BASE_URL: &str = "https://mpic.wikimedia.org/api/v1";

const EXPERIMENTS_ENDPOINT: &str = "/experiment-configs";
const INSTRUMENTS_ENDPOINT: &str = "/instrument-configs";

/// A client that fetches experiment definitions and instrument configs from the config service.
pub struct ConfigurationFetcher {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    config: ConfigurationFetcherConfig,
}

impl ConfigurationFetcher {
    pub fn new(config: ConfigurationFetcherConfig) -> ConfigurationFetcher {
        let client = reqwest::blocking::Client::new();

        ConfigurationFetcher { client, config }
    }

    /// Fetch a fresh [`Configuration`].
    ///
    /// Entries that fail to parse are dropped with a logged warning rather than failing the whole
    /// fetch; only transport-level failures are returned as errors.
    pub fn fetch_configuration(&mut self) -> Result<Configuration> {
        let experiments = self.fetch_configs(EXPERIMENTS_ENDPOINT)?;
        let instruments = self.fetch_configs(INSTRUMENTS_ENDPOINT)?;

        Ok(Configuration::from_server_response(experiments, instruments))
    }

    fn fetch_configs<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<TryParse<T>>> {
        let url = Url::parse_with_params(
            &format!("{}{}", self.config.base_url, endpoint),
            &[
                ("sdkName", &*self.config.sdk_name),
                ("sdkVersion", &*self.config.sdk_version),
                ("coreVersion", env!("CARGO_PKG_VERSION")),
            ],
        )
        .map_err(Error::InvalidBaseUrl)?;

        log::debug!(target: "test_kitchen", endpoint = endpoint; "fetching configs");
        let response = self.client.get(url).send()?;

        let response = response.error_for_status().map_err(|err| {
            log::warn!(target: "test_kitchen",
                endpoint = endpoint;
                "received non-200 response while fetching new configuration: {:?}", err);
            Error::from(err)
        })?;

        let configs = response.json()?;

        log::debug!(target: "test_kitchen", endpoint = endpoint; "successfully fetched configs");

        Ok(configs)
    }
}
