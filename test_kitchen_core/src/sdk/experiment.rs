use serde_json::json;

use crate::coordination::{Coordinator, SamplingUnit};
use crate::sdk::{EventPipeline, BASE_SCHEMA_ID, BASE_STREAM};

/// Contextual attributes every exposure event carries.
pub const EXPOSURE_CONTEXTUAL_ATTRIBUTES: &[&str] = &[
    "page_id",
    "page_title",
    "page_namespace_id",
    "mediawiki_database",
    "performer_is_logged_in",
];

/// The per-experiment façade application code calls.
///
/// The variant encodes the enrollment state and is fixed for the handle's lifetime.
pub enum Experiment {
    /// The subject was algorithmically enrolled. Sends are dispatched.
    Assigned(ActiveExperiment),
    /// The enrollment was manually forced. The override group is real, but sends are logged and
    /// never dispatched, so forced sessions cannot pollute experiment metrics.
    Overridden(ActiveExperiment),
    /// The subject is not enrolled, or the experiment is unknown. All operations are silent
    /// no-ops.
    Unenrolled,
}

/// An experiment the subject has an assignment for, together with the event plumbing its sends
/// go through.
pub struct ActiveExperiment {
    name: String,
    group: String,
    subject_id: String,
    sampling_unit: SamplingUnit,
    coordinator: Coordinator,
    stream_name: String,
    schema_id: String,
    contextual_attributes: Vec<String>,
    pipeline: EventPipeline,
}

impl ActiveExperiment {
    pub fn new(
        name: String,
        group: String,
        subject_id: String,
        sampling_unit: SamplingUnit,
        coordinator: Coordinator,
        pipeline: EventPipeline,
    ) -> ActiveExperiment {
        let contextual_attributes = pipeline.stream_configs.contextual_attributes(BASE_STREAM);
        ActiveExperiment {
            name,
            group,
            subject_id,
            sampling_unit,
            coordinator,
            stream_name: BASE_STREAM.to_owned(),
            schema_id: BASE_SCHEMA_ID.to_owned(),
            contextual_attributes,
            pipeline,
        }
    }

    /// The `experiment` sub-object embedded in every event this handle sends.
    fn enrollment_fragment(&self) -> serde_json::Value {
        json!({
            "enrolled": self.name,
            "assigned": self.group,
            "subject_id": self.subject_id,
            "sampling_unit": self.sampling_unit.as_str(),
            "coordinator": self.coordinator.as_str(),
        })
    }

    fn build_event(
        &self,
        action: &str,
        mut interaction_data: serde_json::Map<String, serde_json::Value>,
        extra_attributes: &[String],
    ) -> crate::events::Event {
        // The enrollment fragment always replaces a caller-supplied `experiment` key, never
        // merges with it.
        interaction_data.insert("experiment".to_owned(), self.enrollment_fragment());

        let mut attributes = self.contextual_attributes.clone();
        attributes.extend_from_slice(extra_attributes);

        self.pipeline.factory.new_event(
            &self.stream_name,
            &self.schema_id,
            &attributes,
            action,
            interaction_data,
        )
    }

    fn dispatch(
        &self,
        action: &str,
        interaction_data: serde_json::Map<String, serde_json::Value>,
        extra_attributes: &[String],
    ) {
        let event = self.build_event(action, interaction_data, extra_attributes);
        self.pipeline.stats.increment_events_sent(&self.name);
        self.pipeline.dispatcher.send_event(event);
    }

    fn log_only(
        &self,
        action: &str,
        interaction_data: serde_json::Map<String, serde_json::Value>,
        extra_attributes: &[String],
    ) {
        let event = self.build_event(action, interaction_data, extra_attributes);
        log::info!(target: "test_kitchen",
            experiment_name = self.name, event:serde = event;
            "suppressing event for manually-overridden experiment");
    }
}

impl Experiment {
    /// The group the subject is assigned to, absent for the unenrolled variant.
    pub fn assigned_group(&self) -> Option<&str> {
        match self {
            Experiment::Assigned(active) | Experiment::Overridden(active) => {
                Some(active.group.as_str())
            }
            Experiment::Unenrolled => None,
        }
    }

    /// Whether the assigned group is one of the candidates. Always false when unenrolled.
    pub fn is_assigned_group(&self, candidates: &[&str]) -> bool {
        match self.assigned_group() {
            Some(group) => candidates.contains(&group),
            None => false,
        }
    }

    /// Builds and dispatches an interaction event on the experiment's stream.
    pub fn send(&self, action: &str, interaction_data: serde_json::Map<String, serde_json::Value>) {
        self.send_with_attributes(action, interaction_data, &[]);
    }

    /// Like [`send`](Experiment::send), with additional per-call contextual attributes.
    pub fn send_with_attributes(
        &self,
        action: &str,
        interaction_data: serde_json::Map<String, serde_json::Value>,
        extra_attributes: &[String],
    ) {
        match self {
            Experiment::Assigned(active) => {
                active.dispatch(action, interaction_data, extra_attributes)
            }
            Experiment::Overridden(active) => {
                active.log_only(action, interaction_data, extra_attributes)
            }
            Experiment::Unenrolled => {}
        }
    }

    /// Sends the standardized exposure event. A no-op when unenrolled.
    pub fn send_exposure(&self) {
        let exposure: Vec<String> = EXPOSURE_CONTEXTUAL_ATTRIBUTES
            .iter()
            .map(|name| name.to_string())
            .collect();
        self.send_with_attributes("experiment_exposure", Default::default(), &exposure);
    }

    /// Re-points subsequent sends at another stream, re-deriving the contextual attribute set
    /// for it. Chainable.
    pub fn set_stream(&mut self, stream_name: &str) -> &mut Experiment {
        if let Experiment::Assigned(active) | Experiment::Overridden(active) = self {
            active.stream_name = stream_name.to_owned();
            active.contextual_attributes = active
                .pipeline
                .stream_configs
                .contextual_attributes(stream_name);
        }
        self
    }

    /// Re-points subsequent sends at another schema. Chainable.
    pub fn set_schema(&mut self, schema_id: &str) -> &mut Experiment {
        if let Experiment::Assigned(active) | Experiment::Overridden(active) = self {
            active.schema_id = schema_id.to_owned();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::context::{CachedContextualAttributes, ContextualAttributesSource};
    use crate::events::{
        Event, EventDispatcher, EventFactory, ExecutionContext, NoopScheduler, Transport,
    };
    use crate::sdk::StreamConfigs;
    use crate::{ContextualAttributes, EventStats};

    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub deliveries: Mutex<Vec<(String, Vec<Event>)>>,
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

    struct FixedSource(ContextualAttributes);

    impl ContextualAttributesSource for FixedSource {
        fn compute(&self) -> ContextualAttributes {
            self.0.clone()
        }
    }

    pub(crate) fn pipeline() -> (EventPipeline, Arc<RecordingTransport>) {
        let attributes: ContextualAttributes = [
            ("agent_client_platform".to_owned(), "mediawiki_rust".into()),
            (
                "agent_client_platform_family".to_owned(),
                "desktop_browser".into(),
            ),
            ("page_id".to_owned(), 42i64.into()),
        ]
        .into_iter()
        .collect();

        let transport = Arc::new(RecordingTransport::default());
        let pipeline = EventPipeline {
            factory: Arc::new(EventFactory::new(
                "en.wikipedia.org".to_owned(),
                Arc::new(CachedContextualAttributes::new(FixedSource(attributes))),
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

    fn assigned(pipeline: EventPipeline) -> Experiment {
        Experiment::Assigned(ActiveExperiment::new(
            "dark-mode".to_owned(),
            "treatment".to_owned(),
            "user:1".to_owned(),
            SamplingUnit::MwUser,
            Coordinator::Default,
            pipeline,
        ))
    }

    #[test]
    fn assigned_group_accessors() {
        let (pipeline, _) = pipeline();
        let experiment = assigned(pipeline);

        assert_eq!(experiment.assigned_group(), Some("treatment"));
        assert!(experiment.is_assigned_group(&["control", "treatment"]));
        assert!(!experiment.is_assigned_group(&["control"]));

        assert_eq!(Experiment::Unenrolled.assigned_group(), None);
        assert!(!Experiment::Unenrolled.is_assigned_group(&["treatment"]));
    }

    #[test]
    fn send_embeds_exactly_the_enrollment_fragment() {
        let (pipeline, transport) = pipeline();
        let stats = Arc::clone(&pipeline.stats);
        let mut experiment = assigned(pipeline);

        let interaction = match json!({ "experiment": "spoofed", "element_id": "save" }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        experiment.send("click", interaction);

        let deliveries = transport.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, BASE_STREAM);
        let event = &deliveries[0].1[0];
        assert_eq!(event.action, "click");
        assert_eq!(
            event.fields["experiment"],
            json!({
                "enrolled": "dark-mode",
                "assigned": "treatment",
                "subject_id": "user:1",
                "sampling_unit": "mw-user",
                "coordinator": "default",
            })
        );
        assert_eq!(event.fields["element_id"], json!("save"));
        assert_eq!(event.fields["page"], json!({ "id": 42.0 }));
        drop(deliveries);

        assert_eq!(stats.events_sent("dark-mode"), 1);
    }

    #[test]
    fn overridden_experiment_never_dispatches() {
        let _ = env_logger::builder().is_test(true).try_init();

        let (pipeline, transport) = pipeline();
        let stats = Arc::clone(&pipeline.stats);
        let mut experiment = Experiment::Overridden(ActiveExperiment::new(
            "dark-mode".to_owned(),
            "treatment".to_owned(),
            crate::coordination::OVERRIDDEN_SUBJECT_ID.to_owned(),
            SamplingUnit::Overridden,
            Coordinator::Forced,
            pipeline,
        ));

        assert_eq!(experiment.assigned_group(), Some("treatment"));
        experiment.send("click", Default::default());
        experiment.send_exposure();

        assert!(transport.deliveries.lock().unwrap().is_empty());
        assert_eq!(stats.events_sent("dark-mode"), 0);
    }

    #[test]
    fn unenrolled_experiment_is_a_silent_no_op() {
        let mut experiment = Experiment::Unenrolled;
        experiment.send("click", Default::default());
        experiment.send_exposure();
    }

    #[test]
    fn send_exposure_uses_the_standard_action() {
        let (pipeline, transport) = pipeline();
        let mut experiment = assigned(pipeline);

        experiment.send_exposure();

        let deliveries = transport.deliveries.lock().unwrap();
        assert_eq!(deliveries[0].1[0].action, "experiment_exposure");
    }

    #[test]
    fn set_stream_rederives_contextual_attributes() {
        let _ = env_logger::builder().is_test(true).try_init();

        let (mut pipeline, transport) = pipeline();
        pipeline.stream_configs = Arc::new(StreamConfigs::new(HashMap::from([
            (
                BASE_STREAM.to_owned(),
                vec!["page_id".to_owned()],
            ),
            ("product_metrics.other".to_owned(), Vec::new()),
        ])));
        let mut experiment = assigned(pipeline);

        experiment
            .set_stream("product_metrics.other")
            .set_schema("/analytics/other/1.0.0");
        experiment.send("click", Default::default());

        let deliveries = transport.deliveries.lock().unwrap();
        assert_eq!(deliveries[0].0, "product_metrics.other");
        let event = &deliveries[0].1[0];
        assert_eq!(event.schema, "/analytics/other/1.0.0");
        // The new stream requests no attributes, so only the required set is attached.
        assert!(event.fields.get("page").is_none());
        assert!(event.fields.get("agent").is_some());
    }
}
