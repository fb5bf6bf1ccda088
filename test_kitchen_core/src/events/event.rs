use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The wire payload delivered to an event intake service.
///
/// The envelope fields (`action`, `$schema`, `meta`, `dt`) are fixed by the factory; contextual
/// attribute groups and caller interaction data appear as additional top-level keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub action: String,
    #[serde(rename = "$schema")]
    pub schema: String,
    pub meta: EventMeta,
    /// Event timestamp, serialized as ISO-8601 UTC with millisecond precision.
    #[serde(with = "iso8601_millis")]
    pub dt: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Deployment-wide domain, e.g. the host wiki.
    pub domain: String,
    /// Destination stream.
    pub stream: String,
}

impl Event {
    /// The destination this event is delivered to.
    pub fn destination(&self) -> &str {
        &self.meta.stream
    }
}

mod iso8601_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
