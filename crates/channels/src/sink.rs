use {async_trait::async_trait, chatbridge_canonical::{CanonicalEvent, CanonicalMessageEnvelope}};

/// What a sink is for, used to route integration-originated events.
///
/// Notification sinks face humans (webhook to a helpdesk, CRM connector)
/// and are skipped for events whose originating request came from an
/// integration. Telemetry sinks receive everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkScope {
    Notification,
    Telemetry,
}

/// External consumer of canonical events.
///
/// Delivery is at-least-once with no ordering guarantee across sinks; a
/// failing or slow sink is isolated by the dispatcher and never sees its
/// error propagate back to the emitting session.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Stable identifier used in logs.
    fn name(&self) -> &str;

    fn scope(&self) -> SinkScope {
        SinkScope::Notification
    }

    async fn deliver(&self, event: &CanonicalEvent) -> anyhow::Result<()>;
}

/// Best-effort persistence collaborator for canonical envelopes.
///
/// Failures are logged and non-fatal; the store is responsible for
/// de-duplicating by `(instance, key.native_id)`.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn store(&self, instance: &str, envelope: &CanonicalMessageEnvelope)
    -> anyhow::Result<()>;
}
