use std::collections::HashMap;

use crate::sdk::BASE_STREAM;

/// Which contextual attributes each stream requests.
///
/// Mirrors the host's stream configuration: every registered stream declares the attribute names
/// its schema can carry. Events on an unregistered stream get no contextual attributes beyond
/// the required set.
#[derive(Debug, Clone)]
pub struct StreamConfigs {
    streams: HashMap<String, Vec<String>>,
}

impl StreamConfigs {
    pub fn new(streams: HashMap<String, Vec<String>>) -> StreamConfigs {
        StreamConfigs { streams }
    }

    /// The attribute names registered for a stream, or an empty list (with a warning) when the
    /// stream is unknown.
    pub fn contextual_attributes(&self, stream_name: &str) -> Vec<String> {
        match self.streams.get(stream_name) {
            Some(attributes) => attributes.clone(),
            None => {
                log::warn!(target: "test_kitchen",
                    stream_name = stream_name;
                    "stream is not registered, events will carry no contextual attributes");
                Vec::new()
            }
        }
    }

    pub fn is_registered(&self, stream_name: &str) -> bool {
        self.streams.contains_key(stream_name)
    }
}

impl Default for StreamConfigs {
    /// Registers the base stream with the attribute set its schema carries.
    fn default() -> StreamConfigs {
        let base = [
            "page_id",
            "page_title",
            "page_namespace_id",
            "page_wikidata_qid",
            "page_content_language",
            "mediawiki_database",
            "performer_id",
            "performer_name",
            "performer_is_logged_in",
            "performer_is_bot",
            "performer_groups",
            "performer_language",
            "performer_edit_count_bucket",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect();

        StreamConfigs {
            streams: HashMap::from([(BASE_STREAM.to_owned(), base)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_stream_is_registered_by_default() {
        let configs = StreamConfigs::default();
        assert!(configs.is_registered(BASE_STREAM));
        assert!(configs
            .contextual_attributes(BASE_STREAM)
            .contains(&"page_id".to_owned()));
    }

    #[test]
    fn unknown_streams_get_no_attributes() {
        let _ = env_logger::builder().is_test(true).try_init();

        let configs = StreamConfigs::default();
        assert!(configs.contextual_attributes("no.such.stream").is_empty());
    }
}
