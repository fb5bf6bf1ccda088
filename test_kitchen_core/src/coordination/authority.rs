use crate::context::{RequestContext, SubjectIdentity};
use crate::coordination::enrollment::{
    EnrollmentResult, EnrollmentResultBuilder, SamplingUnit, AWAITING_SUBJECT_ID,
};
use crate::coordination::overrides::ExperimentOverrides;
use crate::splitter::{bucket, is_sampled, Sha256Splitter, Splitter};
use crate::ExperimentDefinition;

/// The identity one sampling authority buckets under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub unit: SamplingUnit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectId {
    /// An identity that can be hashed.
    Addressable(String),
    /// The subject will become addressable later (e.g. once an edge-assigned identity exists).
    /// Treated as out-of-sample for now, never as an error.
    Awaiting,
}

/// One enrollment strategy. Authorities run in priority order; an authority that cannot resolve
/// a subject for the request simply yields to the next one.
pub trait SamplingAuthority {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// The subject this authority buckets the request under, or `None` when the request is
    /// outside this authority's remit.
    fn subject(&self, identity: &SubjectIdentity) -> Option<Subject>;
}

/// Buckets authenticated users under their stable per-user identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggedInSamplingAuthority;

impl SamplingAuthority for LoggedInSamplingAuthority {
    fn name(&self) -> &'static str {
        "logged-in"
    }

    fn subject(&self, identity: &SubjectIdentity) -> Option<Subject> {
        match identity {
            SubjectIdentity::User(id) => Some(Subject {
                id: SubjectId::Addressable(id.clone()),
                unit: SamplingUnit::MwUser,
            }),
            _ => None,
        }
    }
}

/// Buckets all remaining subjects under their edge-assigned anonymous identity, or marks them as
/// awaiting one.
#[derive(Debug, Clone, Copy, Default)]
pub struct EveryoneSamplingAuthority;

impl SamplingAuthority for EveryoneSamplingAuthority {
    fn name(&self) -> &'static str {
        "everyone"
    }

    fn subject(&self, identity: &SubjectIdentity) -> Option<Subject> {
        match identity {
            SubjectIdentity::User(_) => None,
            SubjectIdentity::EdgeUnique(id) => Some(Subject {
                id: SubjectId::Addressable(id.clone()),
                unit: SamplingUnit::EdgeUnique,
            }),
            SubjectIdentity::Anonymous => Some(Subject {
                id: SubjectId::Awaiting,
                unit: SamplingUnit::EdgeUnique,
            }),
        }
    }
}

/// Produces the aggregate [`EnrollmentResult`] for one request.
///
/// Overrides are applied first and are never overwritten by a sampling authority. Experiments
/// named by an override but absent from the active definitions are still forced (configuration
/// consistency is a governance concern, not an enrollment one).
pub struct EnrollmentAuthority<S = Sha256Splitter> {
    splitter: S,
    authorities: Vec<Box<dyn SamplingAuthority + Send + Sync>>,
}

impl EnrollmentAuthority<Sha256Splitter> {
    pub fn new() -> EnrollmentAuthority<Sha256Splitter> {
        EnrollmentAuthority {
            splitter: Sha256Splitter,
            authorities: vec![
                Box::new(LoggedInSamplingAuthority),
                Box::new(EveryoneSamplingAuthority),
            ],
        }
    }
}

impl Default for EnrollmentAuthority<Sha256Splitter> {
    fn default() -> Self {
        EnrollmentAuthority::new()
    }
}

impl<S: Splitter> EnrollmentAuthority<S> {
    pub fn with_splitter(splitter: S) -> EnrollmentAuthority<S> {
        EnrollmentAuthority {
            splitter,
            authorities: vec![
                Box::new(LoggedInSamplingAuthority),
                Box::new(EveryoneSamplingAuthority),
            ],
        }
    }

    /// Enrolls the request's subject into every active experiment.
    pub fn enroll(
        &self,
        experiments: &[ExperimentDefinition],
        request: &RequestContext,
    ) -> EnrollmentResult {
        let overrides = ExperimentOverrides::from_cookie(request.overrides_cookie.as_deref());
        let mut builder = EnrollmentResultBuilder::new();

        for definition in experiments {
            builder.add_active_experiment(&definition.name);

            if let Some(group) = overrides.group_for(&definition.name) {
                if definition.groups.iter().any(|g| g == group) {
                    builder.add_forced_decision(&definition.name, group);
                } else {
                    // Invalid override group: fall back to regular sampling.
                    log::debug!(target: "test_kitchen",
                        experiment_name = definition.name, group = group;
                        "override names a group the experiment does not have");
                }
            }
        }

        for authority in &self.authorities {
            let Some(subject) = authority.subject(&request.subject) else {
                continue;
            };
            for definition in experiments {
                if builder.has_considered(&definition.name) {
                    continue;
                }
                match &subject.id {
                    SubjectId::Addressable(subject_id) => {
                        let hash = self.splitter.hash(subject_id, &definition.name);
                        if is_sampled(definition.sample.rate, hash) {
                            let group = bucket(&definition.groups, hash);
                            log::trace!(target: "test_kitchen",
                                experiment_name = definition.name,
                                group = group,
                                authority = authority.name();
                                "enrolled subject");
                            builder.add_default_decision(
                                &definition.name,
                                group,
                                subject_id,
                                subject.unit,
                            );
                        } else {
                            builder.add_unsampled(&definition.name, subject_id, subject.unit);
                        }
                    }
                    SubjectId::Awaiting => {
                        builder.add_unsampled(&definition.name, AWAITING_SUBJECT_ID, subject.unit);
                    }
                }
            }
        }

        // Overrides for experiments no longer in the active set still take effect.
        for (name, group) in overrides.iter() {
            if !builder.has_considered(name) {
                builder.add_forced_decision(name, group);
            }
        }

        builder.build()
    }
}
