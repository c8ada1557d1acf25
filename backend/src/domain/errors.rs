//! Error taxonomy for the console core.
//!
//! Every remote failure is converted into a `ConsoleError` before it leaves
//! a domain service. `kind()` groups the variants into the categories the
//! presentation layer reacts to, and `user_message()` gives the one line
//! that should be shown to the user.

use shared::FormStatus;

use crate::domain::models::{FormId, KidId};
use crate::storage::ApiError;

/// Shown for any rejected access token, whatever the server said
pub const LINK_EXPIRED_MESSAGE: &str = "This link is invalid or has expired.";

/// Used when a transport failure carries no server message
pub const TRANSPORT_FALLBACK_MESSAGE: &str = "The server could not be reached. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Unauthorized,
    TransportFailure,
    PartialBatchFailure,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsoleError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Form {form_id} cannot move from {from} to {to}")]
    InvalidTransition {
        form_id: FormId,
        from: FormStatus,
        to: FormStatus,
    },
    #[error("Intake process already started for kid {0}")]
    AlreadyStarted(KidId),
    #[error("Access link rejected")]
    LinkExpired,
    #[error("Verification code rejected")]
    InvalidCode,
    #[error("Failed to send verification code: {0}")]
    SendFailed(String),
    #[error("Transport failure: {0}")]
    TransportFailure(String),
    #[error("Batch commit stopped after {committed} of {attempted} writes: {message}")]
    PartialBatchFailure {
        attempted: usize,
        committed: usize,
        message: String,
    },
}

impl ConsoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsoleError::NotFound(_) => ErrorKind::NotFound,
            ConsoleError::Validation(_)
            | ConsoleError::InvalidTransition { .. }
            | ConsoleError::AlreadyStarted(_) => ErrorKind::Validation,
            ConsoleError::LinkExpired | ConsoleError::InvalidCode => ErrorKind::Unauthorized,
            ConsoleError::SendFailed(_) | ConsoleError::TransportFailure(_) => {
                ErrorKind::TransportFailure
            }
            ConsoleError::PartialBatchFailure { .. } => ErrorKind::PartialBatchFailure,
        }
    }

    /// Localized, user-safe text for a notification
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::NotFound(_) => "The requested record could not be found.".to_string(),
            ConsoleError::Validation(message) => message.clone(),
            ConsoleError::InvalidTransition { .. } => {
                "A completed form cannot be moved back to not started.".to_string()
            }
            ConsoleError::AlreadyStarted(_) => {
                "An intake process has already been started for this child.".to_string()
            }
            ConsoleError::LinkExpired => LINK_EXPIRED_MESSAGE.to_string(),
            ConsoleError::InvalidCode => {
                "The verification code is incorrect. Please try again.".to_string()
            }
            ConsoleError::SendFailed(_) => {
                "The verification code could not be sent. Please try again.".to_string()
            }
            ConsoleError::TransportFailure(message) => message.clone(),
            ConsoleError::PartialBatchFailure { .. } => {
                "Some attendance changes could not be saved. Please review and try again."
                    .to_string()
            }
        }
    }
}

impl From<ApiError> for ConsoleError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::NotFound => ConsoleError::NotFound("remote record not found".to_string()),
            ApiError::Rejected { message, .. } if !message.trim().is_empty() => {
                ConsoleError::TransportFailure(message)
            }
            ApiError::Rejected { .. } | ApiError::Transport(_) | ApiError::Decode(_) => {
                ConsoleError::TransportFailure(TRANSPORT_FALLBACK_MESSAGE.to_string())
            }
        }
    }
}
