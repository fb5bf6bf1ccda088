use std::sync::Arc;

use crate::sdk::{ActiveInstrument, EventPipeline, Instrument};
use crate::splitter::{is_sampled, Sha256Splitter, Splitter};
use crate::{Configuration, SampleUnit};

/// Produces the correct [`Instrument`] variant from the remote instrument configuration.
///
/// An instrument with a sample config is gated by a binary in/out check: the client-provided
/// session or pageview token is hashed against the instrument name the same way experiment
/// subjects are, and compared to the rate. No group bucketing is involved.
pub struct InstrumentManager<S = Sha256Splitter> {
    configuration: Arc<Configuration>,
    splitter: S,
    session_token: Option<String>,
    pageview_token: Option<String>,
    pipeline: EventPipeline,
}

impl InstrumentManager<Sha256Splitter> {
    pub fn new(
        configuration: Arc<Configuration>,
        session_token: Option<String>,
        pageview_token: Option<String>,
        pipeline: EventPipeline,
    ) -> InstrumentManager<Sha256Splitter> {
        InstrumentManager {
            configuration,
            splitter: Sha256Splitter,
            session_token,
            pageview_token,
            pipeline,
        }
    }
}

impl<S: Splitter> InstrumentManager<S> {
    pub fn with_splitter(
        configuration: Arc<Configuration>,
        splitter: S,
        session_token: Option<String>,
        pageview_token: Option<String>,
        pipeline: EventPipeline,
    ) -> InstrumentManager<S> {
        InstrumentManager {
            configuration,
            splitter,
            session_token,
            pageview_token,
            pipeline,
        }
    }

    pub fn get_instrument(&self, instrument_name: &str) -> Instrument {
        let Some(config) = self.configuration.instrument(instrument_name) else {
            log::debug!(target: "test_kitchen",
                instrument_name = instrument_name;
                "instrument is not configured");
            return Instrument::Unsampled;
        };

        if let Some(sample) = &config.sample {
            if !(0.0..=1.0).contains(&sample.rate) {
                log::warn!(target: "test_kitchen",
                    instrument_name = instrument_name, rate = sample.rate;
                    "instrument has an invalid sampling rate");
                return Instrument::Unsampled;
            }

            let token = match sample.unit {
                SampleUnit::Session => self.session_token.as_deref(),
                SampleUnit::Pageview => self.pageview_token.as_deref(),
            };
            // No token means the sampling unit cannot be resolved yet; treat as out of sample.
            let Some(token) = token else {
                log::debug!(target: "test_kitchen",
                    instrument_name = instrument_name;
                    "no token available for the instrument's sampling unit");
                return Instrument::Unsampled;
            };

            let hash = self.splitter.hash(token, instrument_name);
            if !is_sampled(sample.rate, hash) {
                return Instrument::Unsampled;
            }
        }

        Instrument::Sampled(ActiveInstrument::new(
            config.name.clone(),
            config.stream_name.clone(),
            config.schema_id.clone(),
            config.contextual_attributes.clone(),
            self.pipeline.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CachedContextualAttributes, ContextualAttributesSource};
    use crate::events::{
        Event, EventDispatcher, EventFactory, ExecutionContext, NoopScheduler, Transport,
    };
    use crate::sdk::StreamConfigs;
    use crate::{ContextualAttributes, EventStats, InstrumentConfig, InstrumentSample};

    #[derive(Default)]
    struct NullTransport;

    impl Transport for NullTransport {
        fn deliver(&self, _destination: &str, _events: &[Event]) -> crate::Result<()> {
            Ok(())
        }
    }

    struct EmptySource;

    impl ContextualAttributesSource for EmptySource {
        fn compute(&self) -> ContextualAttributes {
            ContextualAttributes::new()
        }
    }

    fn pipeline() -> EventPipeline {
        EventPipeline {
            factory: Arc::new(EventFactory::new(
                "en.wikipedia.org".to_owned(),
                Arc::new(CachedContextualAttributes::new(EmptySource)),
            )),
            dispatcher: Arc::new(EventDispatcher::new(
                Box::new(NullTransport),
                Box::new(NoopScheduler),
                ExecutionContext::Batch,
            )),
            stats: Arc::new(EventStats::new()),
            stream_configs: Arc::new(StreamConfigs::default()),
        }
    }

    fn configuration(sample: Option<InstrumentSample>) -> Arc<Configuration> {
        Arc::new(Configuration {
            experiments: Vec::new(),
            instruments: vec![InstrumentConfig {
                name: "click-through".to_owned(),
                stream_name: "product_metrics.click_through".to_owned(),
                schema_id: crate::sdk::BASE_SCHEMA_ID.to_owned(),
                contextual_attributes: Vec::new(),
                sample,
            }],
        })
    }

    fn manager(sample: Option<InstrumentSample>) -> InstrumentManager {
        InstrumentManager::new(
            configuration(sample),
            Some("session-token".to_owned()),
            Some("pageview-token".to_owned()),
            pipeline(),
        )
    }

    #[test]
    fn rate_one_is_always_in_sample() {
        let manager = manager(Some(InstrumentSample {
            unit: SampleUnit::Session,
            rate: 1.0,
        }));
        assert!(manager.get_instrument("click-through").is_sampled());
    }

    #[test]
    fn rate_zero_is_never_in_sample() {
        let manager = manager(Some(InstrumentSample {
            unit: SampleUnit::Session,
            rate: 0.0,
        }));
        assert!(!manager.get_instrument("click-through").is_sampled());
    }

    #[test]
    fn instrument_without_sample_config_is_always_sampled() {
        let manager = manager(None);
        assert!(manager.get_instrument("click-through").is_sampled());
    }

    #[test]
    fn unknown_instruments_are_unsampled() {
        let _ = env_logger::builder().is_test(true).try_init();
        let manager = manager(None);
        assert!(!manager.get_instrument("no-such-instrument").is_sampled());
    }

    #[test]
    fn missing_token_means_out_of_sample() {
        let manager = InstrumentManager::new(
            configuration(Some(InstrumentSample {
                unit: SampleUnit::Pageview,
                rate: 1.0,
            })),
            Some("session-token".to_owned()),
            None,
            pipeline(),
        );
        assert!(!manager.get_instrument("click-through").is_sampled());
    }

    #[test]
    fn invalid_rate_means_out_of_sample() {
        let _ = env_logger::builder().is_test(true).try_init();
        let manager = manager(Some(InstrumentSample {
            unit: SampleUnit::Session,
            rate: 1.5,
        }));
        assert!(!manager.get_instrument("click-through").is_sampled());
    }

    #[test]
    fn sampling_is_deterministic_per_token() {
        let config = configuration(Some(InstrumentSample {
            unit: SampleUnit::Session,
            rate: 0.5,
        }));
        let first = InstrumentManager::new(
            Arc::clone(&config),
            Some("session-token".to_owned()),
            None,
            pipeline(),
        );
        let second = InstrumentManager::new(
            config,
            Some("session-token".to_owned()),
            None,
            pipeline(),
        );

        assert_eq!(
            first.get_instrument("click-through").is_sampled(),
            second.get_instrument("click-through").is_sampled()
        );
    }
}
