use std::collections::HashMap;

use crate::coordination::{Coordinator, EnrollmentResult, SamplingUnit};
use crate::sdk::{ActiveExperiment, EventPipeline, Experiment};

/// Produces the correct [`Experiment`] variant from the request's enrollment result.
///
/// Unknown experiment names are not errors: they resolve to the unenrolled handle.
pub struct ExperimentManager {
    enrollment: EnrollmentResult,
    pipeline: EventPipeline,
}

impl ExperimentManager {
    pub fn new(enrollment: EnrollmentResult, pipeline: EventPipeline) -> ExperimentManager {
        ExperimentManager {
            enrollment,
            pipeline,
        }
    }

    pub fn get_experiment(&self, experiment_name: &str) -> Experiment {
        let enrollment = &self.enrollment;

        if !enrollment.is_active(experiment_name) && !enrollment.is_overridden(experiment_name) {
            return Experiment::Unenrolled;
        }

        if !enrollment.is_enrolled(experiment_name) {
            if enrollment.sampling_units.get(experiment_name) == Some(&SamplingUnit::MwUser) {
                log::info!(target: "test_kitchen",
                    experiment_name = experiment_name;
                    "user is not in the experiment sample");
            }
            return Experiment::Unenrolled;
        }

        // An enrolled experiment always carries these entries; treat a gap as unenrolled rather
        // than panicking in the host request.
        let (Some(group), Some(subject_id), Some(sampling_unit), Some(coordinator)) = (
            enrollment.assigned.get(experiment_name),
            enrollment.subject_ids.get(experiment_name),
            enrollment.sampling_units.get(experiment_name),
            enrollment.coordinator.get(experiment_name),
        ) else {
            log::warn!(target: "test_kitchen",
                experiment_name = experiment_name;
                "enrollment result is missing entries for an enrolled experiment");
            return Experiment::Unenrolled;
        };

        let active = ActiveExperiment::new(
            experiment_name.to_owned(),
            group.clone(),
            subject_id.clone(),
            *sampling_unit,
            *coordinator,
            self.pipeline.clone(),
        );

        match coordinator {
            Coordinator::Forced => Experiment::Overridden(active),
            Coordinator::Default => Experiment::Assigned(active),
        }
    }

    /// Experiment name to assigned group, as a defensive copy: mutating the returned map does
    /// not affect the manager.
    pub fn assignments(&self) -> HashMap<String, String> {
        self.enrollment.assigned.clone()
    }

    pub fn enrollment(&self) -> &EnrollmentResult {
        &self.enrollment
    }
}
