//! Analytics event construction and delivery.
//!
//! [`EventFactory`] assembles well-formed events: envelope fields, lazily-resolved contextual
//! attributes, and caller interaction data, with the envelope always winning over caller data.
//! [`EventDispatcher`] queues built events per destination and drains the queues in batches,
//! swallowing transport failures.

mod dispatcher;
mod event;
mod event_factory;

pub use dispatcher::{
    EventDispatcher, ExecutionContext, FlushScheduler, NoopScheduler, Transport,
    DRAIN_QUEUE_DELAY,
};
pub use event::{Event, EventMeta};
pub use event_factory::{EventFactory, REQUIRED_CONTEXTUAL_ATTRIBUTES};
