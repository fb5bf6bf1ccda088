use serde::{Deserialize, Serialize};

/// An experiment definition sourced from the config service.
///
/// Definitions are immutable: they are loaded once per fetch and replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    /// Unique experiment name.
    pub name: String,
    /// Ordered group names. Group order determines bucket intervals, so it must be stable for the
    /// life of the experiment.
    pub groups: Vec<String>,
    pub sample: SampleConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Fraction of subjects included in the experiment, in [0, 1].
    pub rate: f64,
}

impl ExperimentDefinition {
    /// Whether the definition can be used for enrollment. Malformed definitions are skipped with
    /// a logged warning, never treated as fatal.
    fn is_valid(&self) -> bool {
        !self.groups.is_empty() && (0.0..=1.0).contains(&self.sample.rate)
    }
}

/// Granularity of an instrument's sampling check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleUnit {
    Session,
    Pageview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSample {
    pub unit: SampleUnit,
    pub rate: f64,
}

/// A remotely-configured analytics emission point, independent of any experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub name: String,
    pub stream_name: String,
    #[serde(default = "default_schema_id")]
    pub schema_id: String,
    /// Contextual attribute names to attach to this instrument's events.
    #[serde(default)]
    pub contextual_attributes: Vec<String>,
    /// Optional sampling. An instrument without a sample config is always in-sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<InstrumentSample>,
}

fn default_schema_id() -> String {
    crate::sdk::BASE_SCHEMA_ID.to_owned()
}

/// `TryParse` allows one config entry to fail parsing without failing the whole response.
///
/// This isolates errors to a subtree: if one experiment definition uses a newer format, the rest
/// of the definitions are still usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// Successfully parsed.
    Parsed(T),
    /// Parsing failed.
    ParseFailed(serde_json::Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// All remotely-provided configuration: active experiment definitions and instrument configs.
///
/// `Configuration` is immutable and replaced completely on refresh. An empty configuration is a
/// valid state (nothing fetched yet, or the config service is unavailable) and resolves every
/// lookup to "unknown".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    /// Valid experiment definitions, in server order.
    pub experiments: Vec<ExperimentDefinition>,
    /// Instrument configs, in server order.
    pub instruments: Vec<InstrumentConfig>,
}

impl Configuration {
    /// Build a `Configuration` from config service responses, dropping entries that failed to
    /// parse or validate.
    pub fn from_server_response(
        experiments: Vec<TryParse<ExperimentDefinition>>,
        instruments: Vec<TryParse<InstrumentConfig>>,
    ) -> Configuration {
        let experiments = experiments
            .into_iter()
            .filter_map(|entry| match entry {
                TryParse::Parsed(definition) if definition.is_valid() => Some(definition),
                TryParse::Parsed(definition) => {
                    log::warn!(target: "test_kitchen",
                        experiment_name = definition.name;
                        "skipping malformed experiment definition");
                    None
                }
                TryParse::ParseFailed(value) => {
                    log::warn!(target: "test_kitchen",
                        entry:serde = value;
                        "failed to parse experiment definition");
                    None
                }
            })
            .collect();

        let instruments = instruments
            .into_iter()
            .filter_map(|entry| match entry {
                TryParse::Parsed(config) => Some(config),
                TryParse::ParseFailed(value) => {
                    log::warn!(target: "test_kitchen",
                        entry:serde = value;
                        "failed to parse instrument config");
                    None
                }
            })
            .collect();

        Configuration {
            experiments,
            instruments,
        }
    }

    /// Look up an experiment definition by name.
    pub fn experiment(&self, name: &str) -> Option<&ExperimentDefinition> {
        self.experiments.iter().find(|def| def.name == name)
    }

    /// Look up an instrument config by name.
    pub fn instrument(&self, name: &str) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|config| config.name == name)
    }
}
