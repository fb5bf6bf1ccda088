use std::sync::Arc;

use chrono::Utc;

use crate::context::ContextualAttributesProvider;
use crate::events::event::{Event, EventMeta};

/// Contextual attributes attached to every event regardless of what the stream requests.
pub const REQUIRED_CONTEXTUAL_ATTRIBUTES: &[&str] =
    &["agent_client_platform", "agent_client_platform_family"];

/// Envelope fields callers can never set through interaction data.
const PROTECTED_FIELDS: &[&str] = &["action", "$schema", "meta", "dt"];

/// Builds well-formed analytics events.
///
/// Contextual attributes are resolved through a memoized provider, so the first event built in a
/// request pays the computation cost and later ones reuse it.
pub struct EventFactory {
    domain: String,
    provider: Arc<dyn ContextualAttributesProvider + Send + Sync>,
}

impl EventFactory {
    pub fn new(
        domain: String,
        provider: Arc<dyn ContextualAttributesProvider + Send + Sync>,
    ) -> EventFactory {
        EventFactory { domain, provider }
    }

    /// Assembles one event.
    ///
    /// Caller interaction data is merged in first; the envelope fields always win over
    /// caller-supplied keys of the same name. The requested attribute names are deduplicated,
    /// unioned with [`REQUIRED_CONTEXTUAL_ATTRIBUTES`], and resolved through the provider; each
    /// non-null value lands at `event[primary][secondary]`, splitting the `group_field` name at
    /// its first underscore. Null values are omitted entirely.
    pub fn new_event(
        &self,
        stream_name: &str,
        schema_id: &str,
        requested_attributes: &[String],
        action: &str,
        interaction_data: serde_json::Map<String, serde_json::Value>,
    ) -> Event {
        let mut fields = interaction_data;
        for protected in PROTECTED_FIELDS {
            fields.remove(*protected);
        }

        let mut names: Vec<&str> = Vec::new();
        for name in requested_attributes
            .iter()
            .map(String::as_str)
            .chain(REQUIRED_CONTEXTUAL_ATTRIBUTES.iter().copied())
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let attributes = self.provider.contextual_attributes();
        for name in names {
            let Some(value) = attributes.get(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let Some((primary, secondary)) = name.split_once('_') else {
                continue;
            };
            let slot = fields
                .entry(primary.to_owned())
                .or_insert_with(|| serde_json::Value::Object(Default::default()));
            if !slot.is_object() {
                *slot = serde_json::Value::Object(Default::default());
            }
            if let serde_json::Value::Object(group) = slot {
                group.insert(secondary.to_owned(), value.to_json());
            }
        }

        Event {
            action: action.to_owned(),
            schema: schema_id.to_owned(),
            meta: EventMeta {
                domain: self.domain.clone(),
                stream: stream_name.to_owned(),
            },
            dt: Utc::now(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::context::ContextualAttributesSource;
    use crate::ContextualAttributes;

    struct FixedSource(ContextualAttributes);

    impl ContextualAttributesSource for FixedSource {
        fn compute(&self) -> ContextualAttributes {
            self.0.clone()
        }
    }

    fn factory(attributes: ContextualAttributes) -> EventFactory {
        EventFactory::new(
            "en.wikipedia.org".to_owned(),
            Arc::new(crate::context::CachedContextualAttributes::new(FixedSource(
                attributes,
            ))),
        )
    }

    fn base_attributes() -> ContextualAttributes {
        [
            ("agent_client_platform".to_owned(), "mediawiki_rust".into()),
            (
                "agent_client_platform_family".to_owned(),
                "desktop_browser".into(),
            ),
            ("page_id".to_owned(), 42i64.into()),
            ("performer_is_bot".to_owned(), false.into()),
            ("performer_name".to_owned(), crate::AttributeValue::Null),
        ]
        .into_iter()
        .collect()
    }

    fn interaction(data: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match data {
            serde_json::Value::Object(map) => map,
            _ => panic!("interaction data must be an object"),
        }
    }

    #[test]
    fn envelope_fields_are_always_set() {
        let event = factory(base_attributes()).new_event(
            "product_metrics.web_base",
            "/analytics/product_metrics/web/base/2.0.0",
            &[],
            "init",
            Default::default(),
        );

        assert_eq!(event.action, "init");
        assert_eq!(event.schema, "/analytics/product_metrics/web/base/2.0.0");
        assert_eq!(event.meta.domain, "en.wikipedia.org");
        assert_eq!(event.meta.stream, "product_metrics.web_base");

        let value = serde_json::to_value(&event).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(value["dt"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn callers_cannot_override_envelope_fields() {
        let event = factory(base_attributes()).new_event(
            "product_metrics.web_base",
            "/analytics/product_metrics/web/base/2.0.0",
            &[],
            "click",
            interaction(json!({
                "action": "spoofed",
                "$schema": "/spoofed/1.0.0",
                "meta": { "stream": "spoofed" },
                "dt": "1970-01-01T00:00:00.000Z",
                "element_id": "save-button"
            })),
        );

        assert_eq!(event.action, "click");
        assert_eq!(event.schema, "/analytics/product_metrics/web/base/2.0.0");
        assert_eq!(event.meta.stream, "product_metrics.web_base");
        assert_eq!(event.fields["element_id"], json!("save-button"));

        let value = serde_json::to_value(&event).unwrap();
        assert_ne!(value["dt"], "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn requested_attributes_are_grouped_and_nulls_dropped() {
        let event = factory(base_attributes()).new_event(
            "product_metrics.web_base",
            "/analytics/product_metrics/web/base/2.0.0",
            &[
                "page_id".to_owned(),
                "performer_is_bot".to_owned(),
                "performer_name".to_owned(),
                // Duplicates are resolved once.
                "page_id".to_owned(),
            ],
            "init",
            Default::default(),
        );

        assert_eq!(event.fields["page"], json!({ "id": 42.0 }));
        assert_eq!(event.fields["performer"]["is_bot"], json!(false));
        assert!(event.fields["performer"].get("name").is_none());
    }

    #[test]
    fn required_attributes_are_always_attached() {
        let event = factory(base_attributes()).new_event(
            "product_metrics.web_base",
            "/analytics/product_metrics/web/base/2.0.0",
            &[],
            "init",
            Default::default(),
        );

        assert_eq!(
            event.fields["agent"],
            json!({
                "client_platform": "mediawiki_rust",
                "client_platform_family": "desktop_browser"
            })
        );
    }

    #[test]
    fn attribute_groups_merge_into_caller_objects() {
        let event = factory(base_attributes()).new_event(
            "product_metrics.web_base",
            "/analytics/product_metrics/web/base/2.0.0",
            &["page_id".to_owned()],
            "init",
            interaction(json!({ "page": { "custom": true } })),
        );

        assert_eq!(event.fields["page"], json!({ "custom": true, "id": 42.0 }));
    }
}
