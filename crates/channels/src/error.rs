use std::error::Error as StdError;

/// Crate-wide result type for client and sink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors crossing the client-capability boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The target recipient is not registered on the network. Returned
    /// before anything is sent, so callers never see a partial send.
    #[error("recipient not registered on the network: {recipient}")]
    RecipientNotRegistered { recipient: String },

    /// A media string was neither base64 nor a fetchable URL.
    #[error("invalid media format: {detail}")]
    InvalidMediaFormat { detail: String },

    /// The operation is a permanent non-capability of this client
    /// (e.g. interactive button messages). Never retryable.
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The client handle exists but is not in a usable state yet.
    #[error("client unavailable: {message}")]
    Unavailable { message: String },

    /// Wrapped source error from the underlying client library.
    #[error("client operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn recipient_not_registered(recipient: impl Into<String>) -> Self {
        Self::RecipientNotRegistered {
            recipient: recipient.into(),
        }
    }

    #[must_use]
    pub fn invalid_media(detail: impl Into<String>) -> Self {
        Self::InvalidMediaFormat {
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
