//! The opaque client-capability boundary.
//!
//! The session core never touches the chat-network protocol directly; it
//! drives an implementation of [`ClientCapability`] and consumes the
//! [`NativeEvent`] stream that implementation pushes into the channel
//! handed to [`ClientCapability::initialize`]. These native shapes are the
//! only untyped-ish surface in the system — the normalizer is the single
//! component allowed to interpret them.

use {async_trait::async_trait, tokio::sync::mpsc};

use crate::error::Result;

/// A message as the native client library reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeMessage {
    /// Library-native message id (opaque, stable across re-delivery).
    pub id: String,
    /// Counterpart chat/contact id (`from` for inbound, `to` for outbound).
    pub remote_id: String,
    pub from_me: bool,
    pub body: String,
    /// Native timestamps are seconds and may carry a fractional part.
    pub timestamp: f64,
    /// Mime tag when the native message carries media, as reported after
    /// any transcoding the library performed.
    pub mime_type: Option<String>,
}

/// A chat as listed by the native client.
#[derive(Debug, Clone)]
pub struct NativeChat {
    pub id: String,
    pub name: String,
    pub is_group: bool,
}

/// A freshly created group.
#[derive(Debug, Clone)]
pub struct NativeGroup {
    pub id: String,
    pub subject: String,
    pub participants: Vec<String>,
}

/// Connection and message signals emitted by the native client.
///
/// Delivered per session through a dedicated channel; the session's event
/// loop is the sole consumer, which is what guarantees in-order processing
/// within one instance.
#[derive(Debug, Clone)]
pub enum NativeEvent {
    /// A scannable pairing code was (re-)issued.
    Qr { code: String },
    /// Pairing succeeded.
    Authenticated,
    /// Pairing or session restore failed. Terminal.
    AuthFailure { message: String },
    /// The connection is fully established and usable.
    Ready,
    /// The connection dropped. Terminal.
    Disconnected { reason: String },
    /// An inbound message arrived.
    Message(NativeMessage),
}

/// Resolved media payload handed to the client for sending.
#[derive(Debug, Clone)]
pub enum MediaPayload {
    /// In-process bytes, already decoded.
    Bytes {
        data: Vec<u8>,
        mime_type: Option<String>,
    },
    /// A remote URL the client fetches itself.
    Url(String),
}

impl MediaPayload {
    /// Mime tag describing this payload as resolved, falling back to the
    /// generic octet-stream tag when nothing better is known.
    #[must_use]
    pub fn mime_tag(&self) -> String {
        match self {
            Self::Bytes { mime_type, .. } => mime_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".into()),
            Self::Url(_) => "application/octet-stream".into(),
        }
    }
}

/// Capability surface of one connected chat-network client.
///
/// Implementations own the real connection (browser session, socket,
/// sidecar, ...). Exactly one session holds a given handle; the handle is
/// released on every teardown path. Interactive/button sends are not part
/// of this surface on purpose: the send pipeline rejects them before any
/// capability call.
#[async_trait]
pub trait ClientCapability: Send + Sync {
    /// Start the connection. Events flow into `events` from this point on;
    /// dropping the receiver side is treated as session teardown.
    async fn initialize(&self, events: mpsc::Sender<NativeEvent>) -> Result<()>;

    /// Release the underlying connection and every native resource.
    async fn destroy(&self) -> Result<()>;

    /// Log the account out of the network without destroying the handle.
    async fn logout(&self) -> Result<()>;

    /// Whether `recipient` exists on the network.
    async fn is_registered_recipient(&self, recipient: &str) -> Result<bool>;

    async fn send_text(&self, to: &str, text: &str) -> Result<NativeMessage>;

    async fn send_media(
        &self,
        to: &str,
        payload: MediaPayload,
        caption: Option<&str>,
    ) -> Result<NativeMessage>;

    /// Send audio as a voice note. The client transcodes to its own codec.
    async fn send_voice_note(&self, to: &str, payload: MediaPayload) -> Result<NativeMessage>;

    async fn list_chats(&self) -> Result<Vec<NativeChat>>;

    async fn create_group(&self, subject: &str, participants: &[String]) -> Result<NativeGroup>;

    /// Display name for a contact, if the network knows one. Lookups may
    /// suspend (contact fetch) and may fail; callers degrade to an empty
    /// name rather than dropping the message.
    async fn contact_display_name(&self, id: &str) -> Result<Option<String>>;
}
