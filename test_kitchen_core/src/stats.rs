use std::collections::HashMap;
use std::sync::Mutex;

/// Per-experiment counters for dispatched events.
///
/// Incremented on every experiment event that is actually handed to the dispatcher, labeled by
/// experiment name. Meant to be scraped by the host's stats pipeline.
#[derive(Debug, Default)]
pub struct EventStats {
    events_sent: Mutex<HashMap<String, u64>>,
}

impl EventStats {
    pub fn new() -> EventStats {
        EventStats::default()
    }

    pub fn increment_events_sent(&self, experiment_name: &str) {
        let mut counters = self
            .events_sent
            .lock()
            .expect("thread holding stats lock should not panic");
        *counters.entry(experiment_name.to_owned()).or_insert(0) += 1;
    }

    /// Number of events sent for one experiment.
    pub fn events_sent(&self, experiment_name: &str) -> u64 {
        self.events_sent
            .lock()
            .expect("thread holding stats lock should not panic")
            .get(experiment_name)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_labeled_by_experiment() {
        let stats = EventStats::new();
        stats.increment_events_sent("dark-mode");
        stats.increment_events_sent("dark-mode");
        stats.increment_events_sent("sticky-header");

        assert_eq!(stats.events_sent("dark-mode"), 2);
        assert_eq!(stats.events_sent("sticky-header"), 1);
        assert_eq!(stats.events_sent("unknown"), 0);
    }
}
