//! Outbound send pipeline.
//!
//! Validates the target, resolves the media payload from whichever shape
//! the caller supplied, invokes the client capability, and publishes the
//! canonical `SEND_MESSAGE` event. The recipient-registration check always
//! runs first so callers never observe a partially-sent state.

use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    tracing::debug,
    url::Url,
};

use {
    chatbridge_canonical::{CanonicalEvent, CanonicalMessageEnvelope, EventPayload},
    chatbridge_channels::{Dispatcher, MediaPayload},
};

use crate::{
    connection::Session,
    error::{Error, Result},
    normalize,
};

/// Sources a caller may supply media in, tried in this order: in-process
/// bytes win over strings; strings are base64 first, URL second.
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// Already-resolved bytes, e.g. an uploaded file.
    Bytes {
        data: Vec<u8>,
        mime_type: Option<String>,
    },
    /// A base64 string (optionally a data URL) or a remote http(s) URL,
    /// detected by format.
    Encoded(String),
}

#[derive(Debug, Clone)]
pub enum OutboundContent {
    Text {
        text: String,
    },
    Media {
        source: MediaSource,
        caption: Option<String>,
    },
    Audio {
        source: MediaSource,
    },
    /// Interactive button messages. Permanently unsupported by this
    /// client; rejected before any capability call.
    Buttons,
}

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// Raw recipient identifier; network-suffix normalized before use.
    pub recipient: String,
    pub content: OutboundContent,
    /// Suppresses forwarding to notification-scoped sinks (the event
    /// still reaches telemetry and persistence).
    pub integration_originated: bool,
}

/// Acknowledgment returned to the caller after a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub native_id: String,
}

/// Append the network suffix when the raw id carries none.
pub fn normalize_recipient(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("recipient must not be empty"));
    }
    if trimmed.contains('@') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}@c.us"))
    }
}

/// Resolve a media source into the payload handed to the client.
///
/// Data URLs contribute their mime tag; everything after the first comma
/// is the base64 payload. A string that is neither decodable base64 nor an
/// http(s) URL is rejected.
fn resolve_media(source: MediaSource) -> chatbridge_channels::Result<MediaPayload> {
    match source {
        MediaSource::Bytes { data, mime_type } => Ok(MediaPayload::Bytes { data, mime_type }),
        MediaSource::Encoded(raw) => {
            let (mime_type, candidate) = match raw.split_once(',') {
                Some((head, rest)) if head.starts_with("data:") => {
                    let mime = head
                        .trim_start_matches("data:")
                        .split(';')
                        .next()
                        .filter(|m| !m.is_empty())
                        .map(str::to_string);
                    (mime, rest)
                },
                _ => (None, raw.as_str()),
            };
            if let Ok(data) = STANDARD.decode(candidate) {
                return Ok(MediaPayload::Bytes { data, mime_type });
            }
            if let Ok(url) = Url::parse(&raw)
                && matches!(url.scheme(), "http" | "https")
            {
                return Ok(MediaPayload::Url(raw));
            }
            Err(chatbridge_channels::Error::invalid_media(
                "media is neither base64 nor an http(s) URL",
            ))
        },
    }
}

/// Content with its media payload already resolved, ready to hand to the
/// client.
enum ResolvedContent {
    Text {
        text: String,
    },
    Media {
        payload: MediaPayload,
        caption: Option<String>,
    },
    Audio {
        payload: MediaPayload,
    },
}

/// Run one outbound request against a session's client.
pub(crate) async fn execute(
    session: &Session,
    dispatcher: &Dispatcher,
    request: OutboundRequest,
) -> Result<SendReceipt> {
    // All local validation precedes any network call: buttons are a
    // permanent non-capability of this client, and media strings resolve
    // in-process.
    let resolved = match request.content {
        OutboundContent::Text { text } => ResolvedContent::Text { text },
        OutboundContent::Media { source, caption } => ResolvedContent::Media {
            payload: resolve_media(source)?,
            caption,
        },
        OutboundContent::Audio { source } => ResolvedContent::Audio {
            payload: resolve_media(source)?,
        },
        OutboundContent::Buttons => {
            return Err(chatbridge_channels::Error::unsupported("button messages").into());
        },
    };
    let recipient = normalize_recipient(&request.recipient)?;
    let client = session.client()?;

    if !client.is_registered_recipient(&recipient).await? {
        return Err(chatbridge_channels::Error::recipient_not_registered(recipient).into());
    }

    let envelope: CanonicalMessageEnvelope = match resolved {
        ResolvedContent::Text { text } => {
            let ack = client.send_text(&recipient, &text).await?;
            normalize::outbound_text(&ack)
        },
        ResolvedContent::Media { payload, caption } => {
            let mime_type = payload.mime_tag();
            let ack = client
                .send_media(&recipient, payload, caption.as_deref())
                .await?;
            normalize::outbound_media(&ack, mime_type, caption)
        },
        ResolvedContent::Audio { payload } => {
            let ack = client.send_voice_note(&recipient, payload).await?;
            normalize::outbound_audio(&ack)
        },
    };

    debug!(
        instance = session.name(),
        recipient,
        native_id = %envelope.key.native_id,
        "message handed to client"
    );

    let receipt = SendReceipt {
        native_id: envelope.key.native_id.clone(),
    };

    dispatcher.persist(session.name(), &envelope);
    let mut event = CanonicalEvent::new(
        session.name(),
        EventPayload::SendMessage { message: envelope },
    );
    if request.integration_originated {
        event = event.from_integration();
    }
    dispatcher.publish(&event);

    Ok(receipt)
}
