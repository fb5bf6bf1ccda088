use crate::coordination::enrollment::EnrollmentResult;

/// Serializes the enrollments as a response header, for consumption by edge caches and the
/// client-side counterpart.
///
/// The format is `X-Experiment-Enrollments: a=b;c=d;` in decision order. An empty string is
/// returned when the subject is not assigned to anything.
pub fn serialize_enrollment_header(result: &EnrollmentResult) -> String {
    let mut pairs = String::new();
    for name in &result.enrolled {
        if let Some(group) = result.assigned.get(name) {
            pairs.push_str(name);
            pairs.push('=');
            pairs.push_str(group);
            pairs.push(';');
        }
    }

    if pairs.is_empty() {
        return String::new();
    }
    format!("X-Experiment-Enrollments: {pairs}")
}
