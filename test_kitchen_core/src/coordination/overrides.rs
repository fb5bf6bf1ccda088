//! The enrollment-override store.
//!
//! Overrides live in a single delimited cookie value: `name:group` entries joined by `;`. Group
//! names must match `[A-Za-z0-9][-_.A-Za-z0-9]+`. Updating an entry replaces only its segment in
//! place, preserving the order of the other entries; the updated value must be written back to
//! the cookie by the host, and a full context reload is required for it to take effect.

use std::sync::OnceLock;

use regex::Regex;

fn group_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new("^[A-Za-z0-9][-_.A-Za-z0-9]+$").expect("hard-coded pattern is valid")
    })
}

fn entry_pattern(experiment_name: &str) -> Regex {
    Regex::new(&format!(
        "(^|;){}:[-_.A-Za-z0-9]+",
        regex::escape(experiment_name)
    ))
    .expect("escaped experiment name cannot break the pattern")
}

pub(crate) fn is_valid_group_name(group: &str) -> bool {
    group_name_pattern().is_match(group)
}

/// Sets the override for one experiment in a raw cookie value, returning the updated value.
///
/// An existing entry for the experiment is replaced in place; otherwise the entry is appended.
/// An invalid group name leaves the value unchanged.
pub fn set_override(raw: &str, experiment_name: &str, group: &str) -> String {
    if !is_valid_group_name(group) {
        log::warn!(target: "test_kitchen",
            experiment_name = experiment_name, group = group;
            "refusing to set enrollment override with invalid group name");
        return raw.to_owned();
    }

    let entry = format!("{experiment_name}:{group}");
    let pattern = entry_pattern(experiment_name);
    if pattern.is_match(raw) {
        pattern
            .replace(raw, |caps: &regex::Captures| {
                format!("{}{}", &caps[1], entry)
            })
            .into_owned()
    } else if raw.is_empty() {
        entry
    } else {
        format!("{raw};{entry}")
    }
}

/// Removes the override for one experiment from a raw cookie value.
pub fn clear_override(raw: &str, experiment_name: &str) -> String {
    raw.split(';')
        .filter(|segment| {
            !segment.is_empty() && segment.split(':').next() != Some(experiment_name)
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Removes all overrides.
pub fn clear_overrides() -> String {
    String::new()
}

/// Parsed view of the override cookie, used during enrollment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentOverrides {
    entries: Vec<(String, String)>,
}

impl ExperimentOverrides {
    /// Parses a raw cookie value. Segments that are not well-formed `name:group` pairs are
    /// dropped.
    pub fn parse(raw: &str) -> ExperimentOverrides {
        let entries = raw
            .split(';')
            .filter_map(|segment| {
                let (name, group) = segment.split_once(':')?;
                if name.is_empty() || !is_valid_group_name(group) {
                    log::debug!(target: "test_kitchen",
                        segment = segment;
                        "dropping malformed enrollment override");
                    return None;
                }
                Some((name.to_owned(), group.to_owned()))
            })
            .collect();
        ExperimentOverrides { entries }
    }

    pub fn from_cookie(cookie: Option<&str>) -> ExperimentOverrides {
        cookie
            .map(ExperimentOverrides::parse)
            .unwrap_or_default()
    }

    pub fn group_for(&self, experiment_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == experiment_name)
            .map(|(_, group)| group.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, group)| (name.as_str(), group.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear_overrides() {
        let raw = set_override("", "foo", "bar");
        assert_eq!(raw, "foo:bar");

        let raw = set_override(&raw, "qux", "quux");
        assert_eq!(raw, "foo:bar;qux:quux");

        // In-place replace, not append.
        let raw = set_override(&raw, "foo", "baz");
        assert_eq!(raw, "foo:baz;qux:quux");

        let raw = clear_override(&raw, "qux");
        assert_eq!(raw, "foo:baz");

        assert_eq!(clear_overrides(), "");
    }

    #[test]
    fn invalid_group_names_are_rejected() {
        let _ = env_logger::builder().is_test(true).try_init();

        assert_eq!(set_override("foo:bar", "foo", "b!ad"), "foo:bar");
        // Single-character group names do not match the pattern.
        assert_eq!(set_override("", "foo", "x"), "");
    }

    #[test]
    fn clearing_an_absent_entry_is_a_no_op() {
        assert_eq!(clear_override("foo:bar", "missing"), "foo:bar");
        assert_eq!(clear_override("", "missing"), "");
    }

    #[test]
    fn parse_drops_malformed_segments() {
        let overrides = ExperimentOverrides::parse("foo:bar;nonsense;:group;qux:quux");

        assert_eq!(overrides.group_for("foo"), Some("bar"));
        assert_eq!(overrides.group_for("qux"), Some("quux"));
        assert_eq!(overrides.iter().count(), 2);
        assert_eq!(overrides.group_for("nonsense"), None);
    }

    #[test]
    fn parse_empty_cookie() {
        assert!(ExperimentOverrides::parse("").is_empty());
        assert!(ExperimentOverrides::from_cookie(None).is_empty());
    }
}
