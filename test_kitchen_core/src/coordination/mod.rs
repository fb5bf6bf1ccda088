//! Per-request enrollment coordination.
//!
//! [`EnrollmentAuthority`] runs the registered sampling authorities over the active experiment
//! definitions and merges their per-experiment decisions into a single [`EnrollmentResult`]. The
//! result is built once per request, immutable afterwards, and consumed by the experiment manager
//! and the enrollment-header serializer.

mod authority;
mod enrollment;
mod header;
mod overrides;

pub use authority::{
    EnrollmentAuthority, EveryoneSamplingAuthority, LoggedInSamplingAuthority, SamplingAuthority,
    Subject, SubjectId,
};
pub use enrollment::{
    Coordinator, EnrollmentResult, EnrollmentResultBuilder, SamplingUnit, AWAITING_SUBJECT_ID,
    OVERRIDDEN_SUBJECT_ID,
};
pub use header::serialize_enrollment_header;
pub use overrides::{clear_override, clear_overrides, set_override, ExperimentOverrides};
