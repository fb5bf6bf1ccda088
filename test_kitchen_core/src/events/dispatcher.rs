use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::events::event::Event;

/// How long events accumulate before a deferred flush drains the queues.
pub const DRAIN_QUEUE_DELAY: Duration = Duration::from_millis(5000);

/// Whether the host is an interactive flow (defer and batch deliveries) or a batch/CLI flow
/// (deliver immediately and synchronously).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Interactive,
    Batch,
}

/// Delivers one batch of events to a destination. Best-effort: the dispatcher swallows every
/// error this returns.
pub trait Transport {
    fn deliver(&self, destination: &str, events: &[Event]) -> crate::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn deliver(&self, destination: &str, events: &[Event]) -> crate::Result<()> {
        (**self).deliver(destination, events)
    }
}

/// Arms a deferred flush. The host environment owns the actual timer and must call
/// [`EventDispatcher::flush_now`] once the delay elapses.
pub trait FlushScheduler {
    fn schedule_flush(&self, delay: Duration);
}

impl<S: FlushScheduler + ?Sized> FlushScheduler for Arc<S> {
    fn schedule_flush(&self, delay: Duration) {
        (**self).schedule_flush(delay)
    }
}

/// Scheduler for hosts without a timer facility. Queued events are only delivered through the
/// lifecycle hooks or an explicit [`EventDispatcher::flush_now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl FlushScheduler for NoopScheduler {
    fn schedule_flush(&self, _delay: Duration) {}
}

#[derive(Default)]
struct DispatcherState {
    /// Pending events per destination, in insertion order.
    queues: Vec<(String, Vec<Event>)>,
    flush_scheduled: bool,
    torn_down: bool,
}

/// Queues events per destination and drains the queues in batches.
///
/// In an interactive execution context, `send_event` enqueues and arms a single deferred flush
/// unless one is already armed; in a batch context it delivers immediately. Delivery failures
/// never propagate: analytics loss is acceptable, faulting the host application is not.
pub struct EventDispatcher {
    transport: Box<dyn Transport + Send + Sync>,
    scheduler: Box<dyn FlushScheduler + Send + Sync>,
    execution_context: ExecutionContext,
    state: Mutex<DispatcherState>,
}

impl EventDispatcher {
    pub fn new(
        transport: Box<dyn Transport + Send + Sync>,
        scheduler: Box<dyn FlushScheduler + Send + Sync>,
        execution_context: ExecutionContext,
    ) -> EventDispatcher {
        EventDispatcher {
            transport,
            scheduler,
            execution_context,
            state: Mutex::new(DispatcherState::default()),
        }
    }

    pub fn send_event(&self, event: Event) {
        let destination = event.destination().to_owned();

        let deliver_immediately = self.execution_context == ExecutionContext::Batch || {
            self.state
                .lock()
                .expect("thread holding event queue lock should not panic")
                .torn_down
        };
        if deliver_immediately {
            self.deliver(&destination, &[event]);
            return;
        }

        let mut state = self
            .state
            .lock()
            .expect("thread holding event queue lock should not panic");
        match state
            .queues
            .iter_mut()
            .find(|(queued_destination, _)| *queued_destination == destination)
        {
            Some((_, events)) => events.push(event),
            None => state.queues.push((destination, vec![event])),
        }
        if !state.flush_scheduled {
            state.flush_scheduled = true;
            drop(state);
            self.scheduler.schedule_flush(DRAIN_QUEUE_DELAY);
        }
    }

    /// Drains every queue, delivering each destination's events as one batch, and disarms the
    /// deferred flush so the next `send_event` starts a fresh delay window.
    pub fn flush_now(&self) {
        let queues = {
            let mut state = self
                .state
                .lock()
                .expect("thread holding event queue lock should not panic");
            state.flush_scheduled = false;
            std::mem::take(&mut state.queues)
        };
        for (destination, events) in queues {
            self.deliver(&destination, &events);
        }
    }

    /// Host teardown has begun: flush synchronously, and deliver any later events immediately.
    pub fn on_teardown(&self) {
        self.state
            .lock()
            .expect("thread holding event queue lock should not panic")
            .torn_down = true;
        self.flush_now();
    }

    /// The page or process lost visibility: flush synchronously.
    pub fn on_visibility_hidden(&self) {
        self.flush_now();
    }

    /// Number of events currently queued across all destinations.
    pub fn queued_event_count(&self) -> usize {
        self.state
            .lock()
            .expect("thread holding event queue lock should not panic")
            .queues
            .iter()
            .map(|(_, events)| events.len())
            .sum()
    }

    fn deliver(&self, destination: &str, events: &[Event]) {
        if let Err(err) = self.transport.deliver(destination, events) {
            log::debug!(target: "test_kitchen",
                destination = destination, err:? = err;
                "event delivery failed");
        }
    }
}
