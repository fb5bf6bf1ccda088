//! A thread-safe in-memory storage for currently active configuration. [`ConfigurationStore`]
//! provides concurrent access for readers (e.g., per-request enrollment) and writers (e.g., the
//! periodic configuration poller).
use std::sync::{Arc, RwLock};

use crate::Configuration;

/// `ConfigurationStore` provides a thread-safe (`Sync`) storage for Test Kitchen configuration
/// that allows concurrent access for readers and writers.
///
/// `Configuration` itself is always immutable and can only be replaced completely. A reader gets
/// a *snapshot* that is unaffected by later writes, so one request sees one configuration.
#[derive(Default)]
pub struct ConfigurationStore {
    configuration: RwLock<Option<Arc<Configuration>>>,
}

impl ConfigurationStore {
    /// Create a new empty configuration store.
    pub fn new() -> Self {
        ConfigurationStore::default()
    }

    /// Get currently-active configuration. Returns None if configuration hasn't been
    /// fetched/stored yet.
    pub fn get_configuration(&self) -> Option<Arc<Configuration>> {
        // self.configuration.read() should always return Ok(). Err() is possible only if the lock
        // is poisoned (writer panicked while holding the lock), which should never happen.
        let configuration = self
            .configuration
            .read()
            .expect("thread holding configuration lock should not panic");

        configuration.clone()
    }

    /// Set new configuration.
    pub fn set_configuration(&self, config: Arc<Configuration>) {
        let mut configuration_slot = self
            .configuration
            .write()
            .expect("thread holding configuration lock should not panic");

        *configuration_slot = Some(config);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::ConfigurationStore;
    use crate::{Configuration, ExperimentDefinition, SampleConfig};

    #[test]
    fn can_set_configuration_from_another_thread() {
        let store = Arc::new(ConfigurationStore::new());

        assert!(store.get_configuration().is_none());

        {
            let store = store.clone();
            let _ = std::thread::spawn(move || {
                store.set_configuration(Arc::new(Configuration {
                    experiments: vec![ExperimentDefinition {
                        name: "my-awesome-experiment".to_owned(),
                        groups: vec!["control".to_owned(), "treatment".to_owned()],
                        sample: SampleConfig { rate: 0.5 },
                    }],
                    instruments: vec![],
                }))
            })
            .join();
        }

        assert!(store.get_configuration().is_some());
    }
}
