//! HTTP webhook sink.
//!
//! Posts each canonical event as a JSON document to a configured URL.
//! Non-2xx responses and transport errors are reported to the dispatcher,
//! which logs and moves on; the webhook endpoint is expected to tolerate
//! at-least-once delivery.

use std::time::Duration;

use {async_trait::async_trait, tracing::debug};

use crate::sink::{EventSink, SinkScope};
use chatbridge_canonical::CanonicalEvent;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookSink {
    name: String,
    url: String,
    scope: SinkScope,
    http: reqwest::Client,
}

impl WebhookSink {
    /// Build a notification-scoped webhook sink for `url`.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            scope: SinkScope::Notification,
            http: reqwest::Client::new(),
        }
    }

    /// Mark this webhook as telemetry-scoped so it also receives
    /// integration-originated events.
    #[must_use]
    pub fn telemetry(mut self) -> Self {
        self.scope = SinkScope::Telemetry;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventSink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> SinkScope {
        self.scope
    }

    async fn deliver(&self, event: &CanonicalEvent) -> anyhow::Result<()> {
        let response = self
            .http
            .post(&self.url)
            .timeout(DELIVERY_TIMEOUT)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        debug!(
            sink = %self.name,
            instance = %event.instance,
            status = response.status().as_u16(),
            "webhook delivered"
        );
        Ok(())
    }
}
