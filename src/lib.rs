//! The Rust SDK for Test Kitchen, an experimentation (A/B testing) and analytics-instrumentation
//! platform for MediaWiki-adjacent services.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] that holds the remotely-fetched configuration, and a
//! per-request [`Session`] that makes enrollment decisions and hands out experiment and
//! instrument handles.
//!
//! Per request, the host:
//! 1. creates a [`Session`] with [`Client::new_session()`], passing the request's
//!    [`RequestContext`];
//! 2. calls [`Session::enroll()`] once to bucket the subject into every active experiment;
//! 3. asks for handles with [`Session::get_experiment()`] / [`Session::get_instrument()`] and
//!    calls `send(...)` / `send_exposure()` on them;
//! 4. calls [`Session::teardown()`] when the request ends, flushing any queued events.
//!
//! Enrollment is deterministic: the same subject gets the same group for the life of an
//! experiment, across processes and platforms.
//!
//! # Poller thread
//!
//! Before creating sessions, you should start the poller thread by calling
//! [`Client::start_poller_thread()`], ensuring that the configuration is fetched. It's also
//! recommended to call [`PollerThread::wait_for_configuration`] before the first session.
//!
//! # Error handling
//!
//! Errors are represented by the [`Error`] enum, and are confined to the configuration plumbing.
//! Enrollment and event construction never fail: unknown experiments resolve to a no-op handle,
//! and transport failures are swallowed at the dispatcher boundary. Nothing in this crate lets an
//! analytics failure become a user-visible error.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages. Consider integrating a `log`-compatible logger implementation for better visibility
//! into SDK operations.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod client;
mod config;
mod poller;
mod session;
mod transport;

#[doc(inline)]
pub use test_kitchen_core::{
    context::{AgentInfo, PageInfo, PerformerInfo, WikiInfo},
    coordination::EnrollmentResult,
    events::ExecutionContext,
    sdk::{Experiment, Instrument, StreamConfigs},
    AttributeValue, Configuration, ContextualAttributes, Error, RequestContext, Result,
    SubjectIdentity,
};

pub use client::Client;
pub use config::ClientConfig;
pub use poller::PollerThread;
pub use session::Session;
pub use transport::HttpTransport;
