use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Subject id recorded for experiments whose subject is not yet addressable (e.g. a logged-out
/// visitor before an edge-assigned identity exists).
pub const AWAITING_SUBJECT_ID: &str = "awaiting";

/// Subject id recorded for manually-overridden enrollments, which bypass hashing entirely.
pub const OVERRIDDEN_SUBJECT_ID: &str = "overridden";

/// The granularity of identity used for an experiment's assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingUnit {
    #[serde(rename = "mw-user")]
    MwUser,
    #[serde(rename = "edge-unique")]
    EdgeUnique,
    #[serde(rename = "overridden")]
    Overridden,
}

impl SamplingUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingUnit::MwUser => "mw-user",
            SamplingUnit::EdgeUnique => "edge-unique",
            SamplingUnit::Overridden => "overridden",
        }
    }
}

/// Which mechanism produced an enrollment decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coordinator {
    /// Algorithmic assignment via hashing.
    Default,
    /// Manual override.
    Forced,
}

impl Coordinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Coordinator::Default => "default",
            Coordinator::Forced => "forced",
        }
    }
}

/// The aggregate result of enrolling one subject into every active experiment.
///
/// Built once per request by [`EnrollmentAuthority`](super::EnrollmentAuthority), immutable after
/// construction. Serialized to the client-side counterpart as page configuration data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentResult {
    /// Names of all experiments known to be live, whether or not the subject is enrolled.
    pub active_experiments: Vec<String>,
    /// Names of experiments the subject is enrolled in, in decision order. Includes overridden
    /// experiments.
    pub enrolled: Vec<String>,
    /// Experiment name to assigned group, for enrolled and overridden experiments.
    pub assigned: HashMap<String, String>,
    /// Experiment name to the subject id used (or the "awaiting"/"overridden" sentinel), for
    /// every experiment that was considered.
    pub subject_ids: HashMap<String, String>,
    /// Experiment name to sampling unit, for every experiment that was considered.
    pub sampling_units: HashMap<String, SamplingUnit>,
    /// Names of manually-overridden experiments.
    pub overrides: Vec<String>,
    /// Experiment name to coordinator, for decided experiments only.
    pub coordinator: HashMap<String, Coordinator>,
}

impl EnrollmentResult {
    pub fn is_active(&self, experiment_name: &str) -> bool {
        self.active_experiments.iter().any(|n| n == experiment_name)
    }

    pub fn is_enrolled(&self, experiment_name: &str) -> bool {
        self.enrolled.iter().any(|n| n == experiment_name)
    }

    pub fn is_overridden(&self, experiment_name: &str) -> bool {
        self.overrides.iter().any(|n| n == experiment_name)
    }

    pub fn assigned_group(&self, experiment_name: &str) -> Option<&str> {
        self.assigned.get(experiment_name).map(String::as_str)
    }
}

/// Accumulates per-experiment decisions from the sampling authorities into one
/// [`EnrollmentResult`].
#[derive(Debug, Default)]
pub struct EnrollmentResultBuilder {
    result: EnrollmentResult,
}

impl EnrollmentResultBuilder {
    pub fn new() -> EnrollmentResultBuilder {
        EnrollmentResultBuilder::default()
    }

    pub fn add_active_experiment(&mut self, experiment_name: &str) {
        if !self.result.is_active(experiment_name) {
            self.result
                .active_experiments
                .push(experiment_name.to_owned());
        }
    }

    /// Whether any authority has already looked at this experiment for the current subject.
    /// Later authorities in priority order skip considered experiments, so a forced or
    /// algorithmic decision is never overwritten.
    pub fn has_considered(&self, experiment_name: &str) -> bool {
        self.result.sampling_units.contains_key(experiment_name)
    }

    /// Record an algorithmic enrollment.
    pub fn add_default_decision(
        &mut self,
        experiment_name: &str,
        group: &str,
        subject_id: &str,
        sampling_unit: SamplingUnit,
    ) {
        if self.has_considered(experiment_name) {
            return;
        }
        self.result.enrolled.push(experiment_name.to_owned());
        self.result
            .assigned
            .insert(experiment_name.to_owned(), group.to_owned());
        self.result
            .subject_ids
            .insert(experiment_name.to_owned(), subject_id.to_owned());
        self.result
            .sampling_units
            .insert(experiment_name.to_owned(), sampling_unit);
        self.result
            .coordinator
            .insert(experiment_name.to_owned(), Coordinator::Default);
    }

    /// Record a manual override. The override group is treated as real, but the experiment is
    /// additionally marked so that no events are ever transmitted for it.
    pub fn add_forced_decision(&mut self, experiment_name: &str, group: &str) {
        if self.has_considered(experiment_name) {
            return;
        }
        self.result.enrolled.push(experiment_name.to_owned());
        self.result.overrides.push(experiment_name.to_owned());
        self.result
            .assigned
            .insert(experiment_name.to_owned(), group.to_owned());
        self.result
            .subject_ids
            .insert(experiment_name.to_owned(), OVERRIDDEN_SUBJECT_ID.to_owned());
        self.result
            .sampling_units
            .insert(experiment_name.to_owned(), SamplingUnit::Overridden);
        self.result
            .coordinator
            .insert(experiment_name.to_owned(), Coordinator::Forced);
    }

    /// Record that an experiment was considered but the subject is out of sample (or not yet
    /// addressable). No `enrolled`/`assigned` entries are added.
    pub fn add_unsampled(
        &mut self,
        experiment_name: &str,
        subject_id: &str,
        sampling_unit: SamplingUnit,
    ) {
        if self.has_considered(experiment_name) {
            return;
        }
        self.result
            .subject_ids
            .insert(experiment_name.to_owned(), subject_id.to_owned());
        self.result
            .sampling_units
            .insert(experiment_name.to_owned(), sampling_unit);
    }

    pub fn build(self) -> EnrollmentResult {
        self.result
    }
}
