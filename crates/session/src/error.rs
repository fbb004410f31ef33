use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed caller request (bad instance name, empty subject, ...).
    #[error("invalid request: {message}")]
    Validation { message: String },

    /// A non-closed session already exists under this instance name.
    #[error("instance already exists: {instance}")]
    Conflict { instance: String },

    /// No session registered under this instance name.
    #[error("instance not found: {instance}")]
    NotFound { instance: String },

    /// The session exists but currently has no pending pairing code.
    #[error("no QR code available for instance: {instance}")]
    NoQrAvailable { instance: String },

    /// Client `destroy()` failed during teardown. The registry entry is
    /// removed regardless; a leaked entry is worse than a possibly
    /// not-fully-released native resource.
    #[error("teardown failed for instance {instance}: {source}")]
    Teardown {
        instance: String,
        #[source]
        source: chatbridge_channels::Error,
    },

    /// Error surfaced from the client/sink boundary (recipient not
    /// registered, invalid media, unsupported operation, ...).
    #[error(transparent)]
    Channel(#[from] chatbridge_channels::Error),
}

impl Error {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(instance: impl Into<String>) -> Self {
        Self::Conflict {
            instance: instance.into(),
        }
    }

    #[must_use]
    pub fn not_found(instance: impl Into<String>) -> Self {
        Self::NotFound {
            instance: instance.into(),
        }
    }

    #[must_use]
    pub fn no_qr(instance: impl Into<String>) -> Self {
        Self::NoQrAvailable {
            instance: instance.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
