use std::collections::HashMap;
use std::sync::Arc;

use test_kitchen_core::context::{CachedContextualAttributes, RequestAttributesSource};
use test_kitchen_core::coordination::{
    self, serialize_enrollment_header, EnrollmentAuthority, EnrollmentResult,
};
use test_kitchen_core::events::{EventDispatcher, EventFactory};
use test_kitchen_core::sdk::{
    EventPipeline, Experiment, ExperimentManager, Instrument, InstrumentManager,
};
use test_kitchen_core::{Configuration, EventStats, RequestContext};

use crate::ClientConfig;

/// The per-request façade: enrollment, handles, and event delivery for one request.
///
/// A session owns its contextual-attribute cache and its event queues; nothing is shared with
/// other sessions except the configuration snapshot and the transport. Create one per request
/// with [`Client::new_session`](crate::Client::new_session) and do not reuse it.
pub struct Session {
    context: Arc<RequestContext>,
    pipeline: EventPipeline,
    experiment_manager: Option<ExperimentManager>,
    instrument_manager: InstrumentManager,
    experiments: Vec<test_kitchen_core::ExperimentDefinition>,
}

impl Session {
    pub(crate) fn new(
        configuration: Arc<Configuration>,
        context: RequestContext,
        config: &ClientConfig,
    ) -> Session {
        let context = Arc::new(context);

        let pipeline = EventPipeline {
            factory: Arc::new(EventFactory::new(
                config.domain.clone(),
                Arc::new(CachedContextualAttributes::new(
                    RequestAttributesSource::new(Arc::clone(&context)),
                )),
            )),
            dispatcher: Arc::new(EventDispatcher::new(
                Box::new(Arc::clone(&config.transport)),
                Box::new(Arc::clone(&config.scheduler)),
                config.execution_context,
            )),
            stats: Arc::new(EventStats::new()),
            stream_configs: Arc::clone(&config.stream_configs),
        };

        let instrument_manager = InstrumentManager::new(
            Arc::clone(&configuration),
            context.session_token.clone(),
            context.pageview_token.clone(),
            pipeline.clone(),
        );

        Session {
            experiments: configuration.experiments.clone(),
            context,
            pipeline,
            experiment_manager: None,
            instrument_manager,
        }
    }

    /// Runs enrollment: buckets the subject into every active experiment, once per session.
    ///
    /// Must be called before [`Session::get_experiment`] or [`Session::enrollment_header`];
    /// until then those degrade to no-ops with an error log.
    pub fn enroll(&mut self) {
        let authority = EnrollmentAuthority::new();
        let enrollment = authority.enroll(&self.experiments, &self.context);
        self.experiment_manager = Some(ExperimentManager::new(enrollment, self.pipeline.clone()));
    }

    /// The aggregate enrollment result, for serialization to a client-side counterpart. `None`
    /// until [`Session::enroll`] has run.
    pub fn enrollment(&self) -> Option<&EnrollmentResult> {
        self.experiment_manager
            .as_ref()
            .map(|manager| manager.enrollment())
    }

    /// Get the handle for one experiment. Unknown names and un-enrolled subjects get the no-op
    /// unenrolled handle.
    pub fn get_experiment(&self, experiment_name: &str) -> Experiment {
        match &self.experiment_manager {
            Some(manager) => manager.get_experiment(experiment_name),
            None => {
                log::error!(target: "test_kitchen",
                    experiment_name = experiment_name;
                    "get_experiment called before enrollment ran");
                Experiment::Unenrolled
            }
        }
    }

    /// Get the handle for one instrument. Unknown names and out-of-sample subjects get the
    /// no-op unsampled handle.
    pub fn get_instrument(&self, instrument_name: &str) -> Instrument {
        self.instrument_manager.get_instrument(instrument_name)
    }

    /// Experiment name to assigned group, as a defensive copy. Empty before enrollment ran.
    pub fn assignments(&self) -> HashMap<String, String> {
        self.experiment_manager
            .as_ref()
            .map(|manager| manager.assignments())
            .unwrap_or_default()
    }

    /// Serializes the enrollments as a response header (`X-Experiment-Enrollments: a=b;c=d;`),
    /// or the empty string when nothing is assigned. Degrades to the empty string with an error
    /// log before enrollment ran.
    pub fn enrollment_header(&self) -> String {
        match &self.experiment_manager {
            Some(manager) => serialize_enrollment_header(manager.enrollment()),
            None => {
                log::error!(target: "test_kitchen",
                    "enrollment_header called before enrollment ran");
                String::new()
            }
        }
    }

    /// Sets the enrollment override for one experiment, returning the updated override cookie
    /// value. The host must write the value back to the cookie; a full context reload is
    /// required for the override to take effect.
    pub fn override_experiment_group(&self, experiment_name: &str, group: &str) -> String {
        coordination::set_override(self.raw_overrides(), experiment_name, group)
    }

    /// Removes the enrollment override for one experiment, returning the updated override
    /// cookie value.
    pub fn clear_experiment_override(&self, experiment_name: &str) -> String {
        coordination::clear_override(self.raw_overrides(), experiment_name)
    }

    /// Removes all enrollment overrides, returning the (empty) override cookie value.
    pub fn clear_experiment_overrides(&self) -> String {
        coordination::clear_overrides()
    }

    /// Number of events sent for one experiment in this session.
    pub fn events_sent(&self, experiment_name: &str) -> u64 {
        self.pipeline.stats.events_sent(experiment_name)
    }

    /// Drains the event queues now, delivering each destination's batch. Meant to be called by
    /// the host's flush scheduler.
    pub fn flush(&self) {
        self.pipeline.dispatcher.flush_now();
    }

    /// The request is ending: flush synchronously. Later sends are delivered immediately.
    pub fn teardown(&self) {
        self.pipeline.dispatcher.on_teardown();
    }

    /// The page or process lost visibility: flush synchronously.
    pub fn visibility_hidden(&self) {
        self.pipeline.dispatcher.on_visibility_hidden();
    }

    fn raw_overrides(&self) -> &str {
        self.context.overrides_cookie.as_deref().unwrap_or("")
    }
}
