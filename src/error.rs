//! Error type shared by the stores, the repository and the view model.
//!
//! Every failure ends up as a message shown to the user; nothing here is
//! fatal to the process.

use thiserror::Error;

/// Errors returned by task operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TodoError {
    /// A required form field is empty or malformed. Raised before any store call.
    #[error("{message}")]
    Validation {
        /// Name of the offending field (`title`, `description`, `date`, ...).
        field: &'static str,
        message: String,
    },

    /// No identity is signed in.
    #[error("No user authenticated")]
    NotAuthenticated,

    /// An update or delete was attempted on a task that was never saved.
    #[error("Todo ID is missing")]
    MissingId,

    /// The store has no document with this id.
    #[error("Todo not found: {0}")]
    NotFound(String),

    /// The store call itself failed (network, permission, I/O, quota).
    #[error("{0}")]
    Remote(String),
}

impl TodoError {
    pub fn remote(message: impl Into<String>) -> Self {
        TodoError::Remote(message.into())
    }

    /// Field to attach the message to, for validation errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            TodoError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TodoError {
    fn from(e: std::io::Error) -> Self {
        TodoError::Remote(e.to_string())
    }
}

impl From<serde_json::Error> for TodoError {
    fn from(e: serde_json::Error) -> Self {
        TodoError::Remote(format!("malformed data: {}", e))
    }
}
