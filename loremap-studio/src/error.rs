//! Studio error types and user-facing normalization.

use loremap_core::{Language, UserMessage};
use thiserror::Error;

/// Result type for remote generation calls.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Errors from a generation job.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Input rejected before any remote call.
    #[error("{}", .0.text(Language::En))]
    Validation(UserMessage),

    /// The premium model needs a credential the user did not grant.
    #[error("credential selection was declined")]
    CredentialDenied,

    /// The job was superseded or cancelled.
    #[error("Cancelled")]
    Cancelled,

    /// The remote side reported a failure.
    #[error("{0}")]
    Remote(String),

    /// The response carried no usable payload.
    #[error("{0}")]
    NoPayload(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code.
        status: u16,
        /// Error text from the body, if any.
        message: String,
    },

    /// Transport failure (connection, TLS, body decoding).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Malformed endpoint configuration.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl GenerationError {
    /// The localized message behind a pre-flight rejection, if this is one.
    #[must_use]
    pub fn rejection(&self) -> Option<UserMessage> {
        match self {
            Self::Validation(message) => Some(*message),
            Self::CredentialDenied => Some(UserMessage::CredentialRequired),
            _ => None,
        }
    }
}

/// Markers of authorization failures in remote error text.
const ACCESS_DENIED_MARKERS: [&str; 3] = ["403", "permission", "entity was not found"];

/// The message shown to the user for a failed job.
///
/// Authorization failures are rewritten to the standard access-denied text;
/// everything else keeps its own message.
#[must_use]
pub fn user_message(error: &GenerationError, language: Language) -> String {
    if let Some(message) = error.rejection() {
        return message.text(language).to_string();
    }
    let raw = error.to_string();
    if ACCESS_DENIED_MARKERS.iter().any(|m| raw.contains(m)) {
        UserMessage::AccessDenied.text(language).to_string()
    } else if raw.is_empty() {
        "Unknown error".to_string()
    } else {
        raw
    }
}

/// Errors from session storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be (de)serialized.
    #[error("stored session is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from project import and export.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// Not JSON at all.
    #[error("failed to parse project file: {0}")]
    Parse(#[from] serde_json::Error),

    /// JSON, but missing `version` or `appState`.
    #[error("Invalid project file format.")]
    InvalidFormat,

    /// Reading or writing the file failed.
    #[error("project file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ProjectError {
    /// Localized text for the user.
    #[must_use]
    pub fn user_message(&self, language: Language) -> String {
        match self {
            Self::InvalidFormat => UserMessage::InvalidProject.text(language).to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for project operations.
pub type ProjectResult<T> = Result<T, ProjectError>;

/// Errors from opening or driving a studio session.
#[derive(Debug, Error)]
pub enum StudioError {
    /// The sketch engine failed.
    #[error(transparent)]
    Canvas(#[from] loremap_canvas::CanvasError),

    /// A project file could not be read or applied.
    #[error(transparent)]
    Project(#[from] ProjectError),
}

/// Result type for studio operations.
pub type StudioResult<T> = Result<T, StudioError>;
