//! Canonical message and event model.
//!
//! Every native message or connection signal, regardless of which client
//! library produced it, is converted into the types defined here before
//! anything downstream (webhooks, CRM connectors, persistence) sees it.
//! All types are immutable value objects: constructed once, cloned freely,
//! never mutated after construction.

pub mod envelope;
pub mod event;

pub use {
    envelope::{
        CanonicalMessageEnvelope, ContentKind, DeliveryStatus, Direction, MessageContent,
        MessageKey,
    },
    event::{CanonicalEvent, ConnectionState, DisconnectReason, EventPayload, EventType},
};

/// Current wall-clock time as whole epoch seconds.
///
/// Canonical timestamps are integer seconds everywhere; fractional native
/// timestamps are truncated at the normalizer boundary.
#[must_use]
pub fn epoch_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
