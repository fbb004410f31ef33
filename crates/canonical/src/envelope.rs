use serde::{Deserialize, Serialize};

/// Identity of a message within one instance.
///
/// `(instance, native_id)` is the uniqueness key for persisted envelopes:
/// re-delivery of the same native event must produce the same key, so
/// de-duplication can happen at the sink rather than at the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageKey {
    /// Chat/contact identifier on the remote network (e.g. `5511...@c.us`).
    pub remote_id: String,
    /// Whether the message originated from the connected account itself.
    pub from_me: bool,
    /// The client library's own message id, passed through verbatim.
    pub native_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Coarse content classification carried alongside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Media,
    Audio,
    Buttons,
}

/// Kind-specific message payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text body.
    Conversation { text: String },
    /// Media attachment. The mime tag reflects the resolved source the
    /// client was handed, not the caller's original request (the client
    /// library may transcode).
    Media {
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    /// Voice note audio.
    Audio { mime_type: String },
}

/// Outbound delivery status. Inbound envelopes carry no status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// The stable envelope every inbound and outbound message is converted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessageEnvelope {
    pub key: MessageKey,
    pub direction: Direction,
    pub content_kind: ContentKind,
    pub content: MessageContent,
    /// Whole epoch seconds, truncated toward zero from the native value.
    pub timestamp: i64,
    /// Display name of the sender. Empty when the contact lookup failed;
    /// a failed lookup never blocks delivery of the message itself.
    #[serde(default)]
    pub sender_display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
}

impl CanonicalMessageEnvelope {
    /// Build an inbound envelope. No status: delivery already happened.
    #[must_use]
    pub fn inbound(
        key: MessageKey,
        content_kind: ContentKind,
        content: MessageContent,
        timestamp: i64,
        sender_display_name: String,
    ) -> Self {
        Self {
            key,
            direction: Direction::Inbound,
            content_kind,
            content,
            timestamp,
            sender_display_name,
            status: None,
        }
    }

    /// Build an outbound envelope, always starting in `Pending`.
    #[must_use]
    pub fn outbound(
        key: MessageKey,
        content_kind: ContentKind,
        content: MessageContent,
        timestamp: i64,
    ) -> Self {
        Self {
            key,
            direction: Direction::Outbound,
            content_kind,
            content,
            timestamp,
            sender_display_name: String::new(),
            status: Some(DeliveryStatus::Pending),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_starts_pending() {
        let env = CanonicalMessageEnvelope::outbound(
            MessageKey {
                remote_id: "123@c.us".into(),
                from_me: true,
                native_id: "m1".into(),
            },
            ContentKind::Text,
            MessageContent::Conversation { text: "hi".into() },
            1_700_000_000,
        );
        assert_eq!(env.status, Some(DeliveryStatus::Pending));
        assert_eq!(env.direction, Direction::Outbound);
    }

    #[test]
    fn inbound_serializes_without_status() {
        let env = CanonicalMessageEnvelope::inbound(
            MessageKey {
                remote_id: "123@c.us".into(),
                from_me: false,
                native_id: "m2".into(),
            },
            ContentKind::Text,
            MessageContent::Conversation { text: "hi".into() },
            1_700_000_000,
            "Alice".into(),
        );
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("status").is_none());
        assert_eq!(json["content"]["conversation"]["text"], "hi");
        assert_eq!(json["key"]["native_id"], "m2");
    }

    #[test]
    fn status_uses_screaming_case() {
        let json = serde_json::to_string(&DeliveryStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
    }
}
