//! `test_kitchen_core` is the core library behind the Test Kitchen SDK. If you're embedding
//! experimentation into a host application, you probably want the `test-kitchen` crate instead.
//!
//! # Overview
//!
//! `test_kitchen_core` is organized as a set of building blocks that the SDK façade assembles once
//! per request.
//!
//! [`Configuration`] is an immutable structure that encapsulates all remotely-provided
//! configuration (experiment definitions and instrument configs). It is replaced wholesale on
//! refresh and never mutated in place.
//!
//! [`ConfigurationStore`](configuration_store::ConfigurationStore) is a thread-safe multi-reader
//! multi-writer in-memory manager for [`Configuration`]. Readers receive a *snapshot* that is not
//! affected by later writes, so one request always sees one consistent configuration.
//!
//! [`ConfigurationFetcher`](configuration_fetcher::ConfigurationFetcher) is an HTTP client that
//! knows how to fetch [`Configuration`] from the config service, and
//! [`PollerThread`](poller_thread::PollerThread) keeps the store up-to-date in the background.
//!
//! The [`coordination`] module decides, once per request, which experiment group the current
//! subject falls into. [`EnrollmentAuthority`](coordination::EnrollmentAuthority) runs the
//! registered sampling authorities over the active experiment definitions and merges their
//! per-experiment decisions into one [`EnrollmentResult`](coordination::EnrollmentResult). The
//! hashing itself lives in [`splitter`]: a pure function from (subject id, experiment name) to a
//! stable value in [0, 1).
//!
//! The [`events`] module builds and delivers analytics events.
//! [`EventFactory`](events::EventFactory) composes well-formed events with lazily-resolved
//! contextual attributes ([`context`]), and [`EventDispatcher`](events::EventDispatcher) queues
//! them per destination and drains the queues in batches. Event delivery is fire-and-forget:
//! a failed delivery is never surfaced to the host application.
//!
//! The [`sdk`] module is what application code ultimately holds:
//! [`Experiment`](sdk::Experiment) and [`Instrument`](sdk::Instrument) handles, produced by the
//! managers from an enrollment result or instrument config. The handle variant (assigned,
//! overridden, unenrolled, unsampled) is fixed at creation time.
//!
//! # Failure policy
//!
//! Nothing in this crate lets an experimentation or analytics failure become a user-visible
//! error. Missing or malformed configuration degrades to the unenrolled/unsampled handle with a
//! logged warning, and transport failures are swallowed at the dispatcher boundary.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod configuration_fetcher;
pub mod configuration_store;
pub mod context;
pub mod coordination;
pub mod events;
pub mod poller_thread;
pub mod sdk;
pub mod splitter;

mod attributes;
mod configuration;
mod error;
mod stats;

pub use attributes::{AttributeValue, ContextualAttributes};
pub use configuration::{
    Configuration, ExperimentDefinition, InstrumentConfig, InstrumentSample, SampleConfig,
    SampleUnit, TryParse,
};
pub use context::{RequestContext, SubjectIdentity};
pub use error::{Error, Result};
pub use stats::EventStats;
