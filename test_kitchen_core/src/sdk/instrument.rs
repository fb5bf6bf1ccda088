use serde_json::json;

use crate::sdk::EventPipeline;

/// The per-instrument façade application code calls.
///
/// Instruments are remotely-configured emission points independent of any experiment. A handle
/// that failed its config lookup or its sampling check is [`Instrument::Unsampled`] and does
/// nothing.
pub enum Instrument {
    Sampled(ActiveInstrument),
    Unsampled,
}

/// A registered, in-sample instrument.
pub struct ActiveInstrument {
    name: String,
    stream_name: String,
    schema_id: String,
    contextual_attributes: Vec<String>,
    /// Position the next event takes in the funnel, starting at 1.
    sequence: u64,
    pipeline: EventPipeline,
}

impl ActiveInstrument {
    pub fn new(
        name: String,
        stream_name: String,
        schema_id: String,
        contextual_attributes: Vec<String>,
        pipeline: EventPipeline,
    ) -> ActiveInstrument {
        ActiveInstrument {
            name,
            stream_name,
            schema_id,
            contextual_attributes,
            sequence: 1,
            pipeline,
        }
    }

    fn send(&mut self, action: &str, mut interaction_data: serde_json::Map<String, serde_json::Value>) {
        // Callers cannot override either field.
        interaction_data.insert("instrument_name".to_owned(), json!(self.name));
        interaction_data.insert(
            "funnel_event_sequence_position".to_owned(),
            json!(self.sequence),
        );
        self.sequence += 1;

        let event = self.pipeline.factory.new_event(
            &self.stream_name,
            &self.schema_id,
            &self.contextual_attributes,
            action,
            interaction_data,
        );
        self.pipeline.dispatcher.send_event(event);
    }
}

impl Instrument {
    pub fn is_sampled(&self) -> bool {
        matches!(self, Instrument::Sampled(_))
    }

    /// Builds and dispatches an event on the instrument's stream, tagged with the instrument
    /// name and its position in the funnel. A no-op when unsampled.
    pub fn send(
        &mut self,
        action: &str,
        interaction_data: serde_json::Map<String, serde_json::Value>,
    ) -> &mut Instrument {
        if let Instrument::Sampled(active) = self {
            active.send(action, interaction_data);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::context::{CachedContextualAttributes, ContextualAttributesSource};
    use crate::events::{
        Event, EventDispatcher, EventFactory, ExecutionContext, NoopScheduler, Transport,
    };
    use crate::sdk::{StreamConfigs, BASE_SCHEMA_ID};
    use crate::{ContextualAttributes, EventStats};

    #[derive(Default)]
    struct RecordingTransport {
        deliveries: Mutex<Vec<(String, Vec<Event>)>>,
    }

    impl Transport for RecordingTransport {
        fn deliver(&self, destination: &str, events: &[Event]) -> crate::Result<()> {
            self.deliveries
                .lock()
                .unwrap()
                .push((destination.to_owned(), events.to_vec()));
            Ok(())
        }
    }

    struct EmptySource;

    impl ContextualAttributesSource for EmptySource {
        fn compute(&self) -> ContextualAttributes {
            ContextualAttributes::new()
        }
    }

    fn pipeline() -> (EventPipeline, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let pipeline = EventPipeline {
            factory: Arc::new(EventFactory::new(
                "en.wikipedia.org".to_owned(),
                Arc::new(CachedContextualAttributes::new(EmptySource)),
            )),
            dispatcher: Arc::new(EventDispatcher::new(
                Box::new(Arc::clone(&transport)),
                Box::new(NoopScheduler),
                ExecutionContext::Batch,
            )),
            stats: Arc::new(EventStats::new()),
            stream_configs: Arc::new(StreamConfigs::default()),
        };
        (pipeline, transport)
    }

    #[test]
    fn funnel_positions_increment_from_one() {
        let (pipeline, transport) = pipeline();
        let mut instrument = Instrument::Sampled(ActiveInstrument::new(
            "click-through".to_owned(),
            "product_metrics.click_through".to_owned(),
            BASE_SCHEMA_ID.to_owned(),
            Vec::new(),
            pipeline,
        ));

        instrument
            .send("impression", Default::default())
            .send("click", Default::default())
            .send("conversion", Default::default());

        let deliveries = transport.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 3);
        for (position, (_, events)) in deliveries.iter().enumerate() {
            let event = &events[0];
            assert_eq!(event.fields["instrument_name"], json!("click-through"));
            assert_eq!(
                event.fields["funnel_event_sequence_position"],
                json!(position as u64 + 1)
            );
        }
    }

    #[test]
    fn callers_cannot_override_instrument_fields() {
        let (pipeline, transport) = pipeline();
        let mut instrument = Instrument::Sampled(ActiveInstrument::new(
            "click-through".to_owned(),
            "product_metrics.click_through".to_owned(),
            BASE_SCHEMA_ID.to_owned(),
            Vec::new(),
            pipeline,
        ));

        let interaction = match json!({
            "instrument_name": "spoofed",
            "funnel_event_sequence_position": 99
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        instrument.send("click", interaction);

        let deliveries = transport.deliveries.lock().unwrap();
        let event = &deliveries[0].1[0];
        assert_eq!(event.fields["instrument_name"], json!("click-through"));
        assert_eq!(event.fields["funnel_event_sequence_position"], json!(1));
    }

    #[test]
    fn unsampled_instrument_is_a_chainable_no_op() {
        let mut instrument = Instrument::Unsampled;
        instrument
            .send("impression", Default::default())
            .send("click", Default::default());
        assert!(!instrument.is_sampled());
    }
}
