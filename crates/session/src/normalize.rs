//! Message normalization.
//!
//! The single place allowed to interpret native message shapes. Everything
//! past this module only ever sees [`CanonicalMessageEnvelope`]. All
//! mapping functions here are pure and deterministic: the asynchronous
//! part of inbound handling (the contact lookup for the display name) is
//! done by the caller and passed in, so delivering the same native event
//! twice yields byte-identical envelopes.

use tracing::debug;

use {
    chatbridge_canonical::{
        CanonicalMessageEnvelope, ContentKind, MessageContent, MessageKey, epoch_now,
    },
    chatbridge_channels::{ClientCapability, NativeMessage},
};

/// Mime tag reported for outbound voice notes. The client transcodes to
/// its own codec regardless of the input payload.
pub const VOICE_NOTE_MIME: &str = "audio/ogg; codecs=opus";

/// Native timestamps are fractional seconds; canonical ones are whole
/// seconds, truncated toward zero. Non-finite input degrades to zero.
#[must_use]
pub fn truncate_timestamp(native: f64) -> i64 {
    if native.is_finite() { native.trunc() as i64 } else { 0 }
}

fn key_for(native: &NativeMessage) -> MessageKey {
    MessageKey {
        remote_id: native.remote_id.clone(),
        from_me: native.from_me,
        native_id: native.id.clone(),
    }
}

/// Convert a native inbound message into a canonical envelope.
#[must_use]
pub fn inbound(native: &NativeMessage, sender_display_name: String) -> CanonicalMessageEnvelope {
    let (kind, content) = match &native.mime_type {
        Some(mime) => (
            ContentKind::Media,
            MessageContent::Media {
                mime_type: mime.clone(),
                caption: (!native.body.is_empty()).then(|| native.body.clone()),
            },
        ),
        None => (
            ContentKind::Text,
            MessageContent::Conversation {
                text: native.body.clone(),
            },
        ),
    };
    CanonicalMessageEnvelope::inbound(
        key_for(native),
        kind,
        content,
        truncate_timestamp(native.timestamp),
        sender_display_name,
    )
}

/// Outbound text envelope from the client's send acknowledgment.
#[must_use]
pub fn outbound_text(ack: &NativeMessage) -> CanonicalMessageEnvelope {
    CanonicalMessageEnvelope::outbound(
        key_for(ack),
        ContentKind::Text,
        MessageContent::Conversation {
            text: ack.body.clone(),
        },
        ack_timestamp(ack),
    )
}

/// Outbound media envelope. The mime tag comes from the resolved payload
/// that was handed to the client, not from the caller's request.
#[must_use]
pub fn outbound_media(
    ack: &NativeMessage,
    mime_type: String,
    caption: Option<String>,
) -> CanonicalMessageEnvelope {
    CanonicalMessageEnvelope::outbound(
        key_for(ack),
        ContentKind::Media,
        MessageContent::Media { mime_type, caption },
        ack_timestamp(ack),
    )
}

/// Outbound voice-note envelope. Always tagged [`VOICE_NOTE_MIME`].
#[must_use]
pub fn outbound_audio(ack: &NativeMessage) -> CanonicalMessageEnvelope {
    CanonicalMessageEnvelope::outbound(
        key_for(ack),
        ContentKind::Audio,
        MessageContent::Audio {
            mime_type: VOICE_NOTE_MIME.into(),
        },
        ack_timestamp(ack),
    )
}

fn ack_timestamp(ack: &NativeMessage) -> i64 {
    let truncated = truncate_timestamp(ack.timestamp);
    if truncated > 0 { truncated } else { epoch_now() }
}

/// Resolve the sender display name via the client's contact lookup.
///
/// Fallible and possibly suspending; failure degrades to an empty name so
/// the message itself is never dropped.
pub async fn resolve_display_name(client: &dyn ClientCapability, remote_id: &str) -> String {
    match client.contact_display_name(remote_id).await {
        Ok(name) => name.unwrap_or_default(),
        Err(e) => {
            debug!(remote_id, error = %e, "contact lookup failed, using empty display name");
            String::new()
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chatbridge_canonical::{DeliveryStatus, Direction};

    fn native_text() -> NativeMessage {
        NativeMessage {
            id: "ABC".into(),
            remote_id: "5511999999999@c.us".into(),
            from_me: false,
            body: "hi".into(),
            timestamp: 1_700_000_000.0,
            mime_type: None,
        }
    }

    #[test]
    fn inbound_text_round_trip() {
        let envelope = inbound(&native_text(), "Alice".into());
        assert_eq!(envelope.key.remote_id, "5511999999999@c.us");
        assert!(!envelope.key.from_me);
        assert_eq!(envelope.key.native_id, "ABC");
        assert_eq!(
            envelope.content,
            MessageContent::Conversation { text: "hi".into() }
        );
        assert_eq!(envelope.timestamp, 1_700_000_000);
        assert_eq!(envelope.direction, Direction::Inbound);
        assert_eq!(envelope.sender_display_name, "Alice");
        assert!(envelope.status.is_none());
    }

    #[test]
    fn fractional_timestamps_truncate() {
        assert_eq!(truncate_timestamp(1_700_000_000.91), 1_700_000_000);
        assert_eq!(truncate_timestamp(0.25), 0);
        assert_eq!(truncate_timestamp(f64::NAN), 0);
    }

    #[test]
    fn duplicate_native_delivery_is_deterministic() {
        let native = native_text();
        let first = inbound(&native, "Alice".into());
        let second = inbound(&native, "Alice".into());
        assert_eq!(first, second);
        assert_eq!(first.key, second.key);
    }

    #[test]
    fn inbound_media_carries_body_as_caption() {
        let mut native = native_text();
        native.mime_type = Some("image/jpeg".into());
        let envelope = inbound(&native, String::new());
        assert_eq!(envelope.content_kind, ContentKind::Media);
        assert_eq!(
            envelope.content,
            MessageContent::Media {
                mime_type: "image/jpeg".into(),
                caption: Some("hi".into()),
            }
        );
    }

    #[test]
    fn outbound_text_is_pending() {
        let mut ack = native_text();
        ack.from_me = true;
        let envelope = outbound_text(&ack);
        assert_eq!(envelope.status, Some(DeliveryStatus::Pending));
        assert!(envelope.key.from_me);
        assert_eq!(envelope.timestamp, 1_700_000_000);
    }

    #[test]
    fn outbound_audio_mime_is_fixed() {
        let envelope = outbound_audio(&native_text());
        assert_eq!(
            envelope.content,
            MessageContent::Audio {
                mime_type: VOICE_NOTE_MIME.into(),
            }
        );
    }

    #[test]
    fn missing_ack_timestamp_falls_back_to_now() {
        let mut ack = native_text();
        ack.timestamp = 0.0;
        let envelope = outbound_text(&ack);
        assert!(envelope.timestamp > 0);
    }
}
