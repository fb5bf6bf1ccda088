//! Deterministic subject bucketing.
//!
//! The functions in this module are pure: the same (subject id, experiment name) pair always
//! produces the same value, across processes and platforms, so a subject's group assignment is
//! stable for the life of an experiment.
use sha2::{Digest, Sha256};

/// Hashes a subject identifier into a stable pseudo-random value for one experiment.
pub trait Splitter {
    /// Map `subject_id` to a value in [0, 1) that is uniform across subjects and independent
    /// between experiments.
    fn hash(&self, subject_id: &str, experiment_name: &str) -> f64;
}

/// The default (and only) splitter.
///
/// Combines the subject id and experiment name into one key, hashes it with SHA-256, and
/// normalizes the first 8 hex digits (a 32-bit unsigned integer) by `u32::MAX`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Splitter;

impl Splitter for Sha256Splitter {
    fn hash(&self, subject_id: &str, experiment_name: &str) -> f64 {
        let mut hasher = Sha256::new();
        hasher.update(subject_id.as_bytes());
        hasher.update(experiment_name.as_bytes());
        let digest = hasher.finalize();

        // The digest is 32 bytes, so the slice is always 4 bytes long.
        let prefix = u32::from_be_bytes(digest[0..4].try_into().unwrap());
        prefix as f64 / u32::MAX as f64
    }
}

/// Whether a subject with the given hash value is included in sampling at `rate`.
///
/// Rate 0 excludes everyone; rate 1 includes everyone.
pub fn is_sampled(rate: f64, hash: f64) -> bool {
    hash < rate
}

/// Bucket `hash` into one of `groups`.
///
/// [0, 1) is partitioned into `groups.len()` equal-width half-open intervals `[k/n, (k+1)/n)` in
/// group list order; the group whose interval contains `hash` is the assignment.
///
/// Must not be called with an empty group list; experiments without groups are rejected at
/// configuration parse time.
pub fn bucket<'a>(groups: &'a [String], hash: f64) -> &'a str {
    debug_assert!(!groups.is_empty());

    let n = groups.len();
    // .min() clamps the theoretical hash == 1.0 edge into the last interval.
    let index = ((hash * n as f64) as usize).min(n - 1);
    &groups[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let splitter = Sha256Splitter;

        let first = splitter.hash("0x0ff1c3", "my-awesome-experiment");
        let second = splitter.hash("0x0ff1c3", "my-awesome-experiment");
        let another_instance = Sha256Splitter.hash("0x0ff1c3", "my-awesome-experiment");

        assert_eq!(first, second);
        assert_eq!(first, another_instance);
    }

    #[test]
    fn hash_is_in_unit_interval() {
        let splitter = Sha256Splitter;

        for i in 0..1000 {
            let hash = splitter.hash(&format!("subject-{i}"), "experiment");
            assert!((0.0..=1.0).contains(&hash), "hash {hash} out of range");
        }
    }

    #[test]
    fn hash_varies_by_experiment() {
        let splitter = Sha256Splitter;

        assert_ne!(
            splitter.hash("subject", "experiment-a"),
            splitter.hash("subject", "experiment-b"),
        );
    }

    #[test]
    fn is_sampled_is_exactly_hash_below_rate() {
        assert!(is_sampled(0.5, 0.0));
        assert!(is_sampled(0.5, 0.499));
        assert!(!is_sampled(0.5, 0.5));
        assert!(!is_sampled(0.5, 0.999));

        // Rate 0 excludes everyone; rate 1 includes everyone.
        assert!(!is_sampled(0.0, 0.0));
        assert!(is_sampled(1.0, 0.999));
    }

    #[test]
    fn bucket_partitions_unit_interval() {
        let groups = vec!["control".to_owned(), "treatment".to_owned()];

        assert_eq!(bucket(&groups, 0.0), "control");
        assert_eq!(bucket(&groups, 0.499), "control");
        // Interval boundaries belong to the interval whose lower bound equals the value.
        assert_eq!(bucket(&groups, 0.5), "treatment");
        assert_eq!(bucket(&groups, 0.999), "treatment");
    }

    #[test]
    fn bucket_covers_unit_interval_for_any_group_count() {
        for n in 1..=7 {
            let groups: Vec<String> = (0..n).map(|i| format!("group-{i}")).collect();

            for step in 0..1000 {
                let hash = step as f64 / 1000.0;
                let group = bucket(&groups, hash);
                let expected = ((hash * n as f64) as usize).min(n - 1);
                assert_eq!(group, groups[expected]);
            }
        }
    }

    #[test]
    fn bucket_respects_group_order() {
        let groups = vec!["a".to_owned(), "b".to_owned(), "c".to_owned(), "d".to_owned()];

        assert_eq!(bucket(&groups, 0.1), "a");
        assert_eq!(bucket(&groups, 0.3), "b");
        assert_eq!(bucket(&groups, 0.6), "c");
        assert_eq!(bucket(&groups, 0.9), "d");
    }
}
