//! The handles application code holds: [`Experiment`] and [`Instrument`], produced by
//! [`ExperimentManager`] and [`InstrumentManager`].
//!
//! Variant choice (assigned, overridden, unenrolled, unsampled) is centralized in the managers,
//! so call sites never branch on enrollment state: they ask for a handle by name and call it.
//! The variant is fixed at creation time; a new handle must be requested to observe a changed
//! enrollment.

mod experiment;
mod experiment_manager;
mod instrument;
mod instrument_manager;
mod stream_configs;

pub use experiment::{ActiveExperiment, Experiment, EXPOSURE_CONTEXTUAL_ATTRIBUTES};
pub use experiment_manager::ExperimentManager;
pub use instrument::{ActiveInstrument, Instrument};
pub use instrument_manager::InstrumentManager;
pub use stream_configs::StreamConfigs;

use std::sync::Arc;

use crate::events::{EventDispatcher, EventFactory};
use crate::EventStats;

/// The shared event plumbing handed to both managers: one factory, dispatcher, stats registry,
/// and stream registry per request.
#[derive(Clone)]
pub struct EventPipeline {
    pub factory: Arc<EventFactory>,
    pub dispatcher: Arc<EventDispatcher>,
    pub stats: Arc<EventStats>,
    pub stream_configs: Arc<StreamConfigs>,
}

/// Stream experiment events are produced to unless a handle is re-pointed.
pub const BASE_STREAM: &str = "product_metrics.web_base";

/// Schema that events on the base stream conform to.
pub const BASE_SCHEMA_ID: &str = "/analytics/product_metrics/web/base/2.0.0";
