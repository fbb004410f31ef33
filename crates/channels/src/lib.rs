//! Collaborator seams for the session core.
//!
//! Everything the session layer talks to lives behind a trait defined here:
//! the native chat-network client ([`client::ClientCapability`]), external
//! event consumers ([`sink::EventSink`], [`sink::PersistenceSink`]), and the
//! fan-out machinery that keeps slow sinks from ever blocking a session's
//! event loop ([`dispatch::Dispatcher`]).

pub mod client;
pub mod dispatch;
pub mod error;
pub mod sink;
pub mod webhook;

pub use {
    client::{ClientCapability, MediaPayload, NativeChat, NativeEvent, NativeGroup, NativeMessage},
    dispatch::Dispatcher,
    error::{Error, Result},
    sink::{EventSink, PersistenceSink, SinkScope},
    webhook::WebhookSink,
};
