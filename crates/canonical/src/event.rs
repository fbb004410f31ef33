use serde::{Deserialize, Serialize};

use crate::envelope::CanonicalMessageEnvelope;

/// Connection lifecycle states for one session.
///
/// `Closed` is terminal for every cause; the cause travels separately as a
/// [`DisconnectReason`] so registry cleanup stays single-pathed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Initializing,
    QrPending,
    Authenticated,
    Open,
    Closed,
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    AuthFailure,
    Disconnected,
    QrLimitExceeded,
    LoggedOut,
}

/// Discriminant of a canonical event, for sink-side routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    QrcodeUpdated,
    ConnectionUpdate,
    MessagesUpsert,
    SendMessage,
}

/// Event-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventPayload {
    /// A fresh pairing code was issued for a pending session.
    QrcodeUpdated {
        code: String,
        /// Derived display form (SVG data URL). Regenerable from `code`.
        rendered: String,
    },
    /// The session's connection state changed.
    ConnectionUpdate {
        state: ConnectionState,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<DisconnectReason>,
    },
    /// One or more inbound messages arrived.
    MessagesUpsert {
        messages: Vec<CanonicalMessageEnvelope>,
    },
    /// An outbound message was handed to the client.
    SendMessage { message: CanonicalMessageEnvelope },
}

impl EventPayload {
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Self::QrcodeUpdated { .. } => EventType::QrcodeUpdated,
            Self::ConnectionUpdate { .. } => EventType::ConnectionUpdate,
            Self::MessagesUpsert { .. } => EventType::MessagesUpsert,
            Self::SendMessage { .. } => EventType::SendMessage,
        }
    }
}

/// A canonical event as delivered to sinks. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub instance: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub payload: EventPayload,
    /// Set when the triggering request came from an integration rather
    /// than a human caller. Routing metadata only, never serialized:
    /// notification-scoped sinks skip these events.
    #[serde(skip)]
    pub integration_originated: bool,
}

impl CanonicalEvent {
    #[must_use]
    pub fn new(instance: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            instance: instance.into(),
            timestamp: crate::epoch_now(),
            payload,
            integration_originated: false,
        }
    }

    #[must_use]
    pub fn from_integration(mut self) -> Self {
        self.integration_originated = true;
        self
    }

    #[must_use]
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}
