use test_kitchen_core::events::{Event, Transport};

/// Default [`Transport`]: posts each batch to the event intake service as one JSON array.
///
/// Delivery is fire-and-forget from the SDK's point of view; the dispatcher swallows any error
/// this returns.
pub struct HttpTransport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    intake_url: String,
}

impl HttpTransport {
    /// Creates a transport delivering to the given intake URL.
    pub fn new(intake_url: String) -> HttpTransport {
        HttpTransport {
            client: reqwest::blocking::Client::new(),
            intake_url,
        }
    }
}

impl Transport for HttpTransport {
    fn deliver(&self, destination: &str, events: &[Event]) -> test_kitchen_core::Result<()> {
        log::debug!(target: "test_kitchen",
            destination = destination, count = events.len();
            "delivering event batch");
        self.client
            .post(&self.intake_url)
            .json(events)
            .send()?
            .error_for_status()?;
        Ok(())
    }
}
