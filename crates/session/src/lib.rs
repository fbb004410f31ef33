//! Session lifecycle core.
//!
//! Manages many concurrent chat-network sessions, one per instance name:
//! the per-instance connection state machine, QR issuance policy, message
//! normalization, the outbound send pipeline, and the registry that keeps
//! at most one live session per name. Everything external (native client,
//! webhooks, persistence) attaches through the traits in
//! `chatbridge-channels`.

pub mod config;
pub mod connection;
pub mod error;
pub mod normalize;
pub mod qr;
pub mod registry;
pub mod send;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod testing;

pub use {
    config::{LaunchOptions, SessionConfig},
    connection::Session,
    error::{Error, Result},
    registry::{
        ClientFactory, QrCodeResponse, RecipientCheck, SessionRegistry, SessionSummary,
        StateSnapshot,
    },
    send::{MediaSource, OutboundContent, OutboundRequest, SendReceipt},
};
