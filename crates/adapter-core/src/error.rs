//! Error types for the block-blob storage adapter

use thiserror::Error;

/// Result type alias using the adapter Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by the adapter facade and blob service clients
#[derive(Error, Debug)]
pub enum Error {
    // Lookup errors
    #[error("Path not found: {path}")]
    NotFound { path: String },

    // Service errors
    #[error("Blob service {operation} failed: {message}")]
    Service { operation: String, message: String },

    #[error("Invalid block list for {key}: {message}")]
    InvalidBlockList { key: String, message: String },

    /// A multi-step operation stopped after some of its steps took effect.
    /// `completed` names what is already visible in the store.
    #[error("{operation} partially applied ({completed} done, {failed} failed): {message}")]
    PartialOperation {
        operation: String,
        completed: String,
        failed: String,
        message: String,
    },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor for collaborator failures
    pub fn service(operation: impl Into<String>, message: impl ToString) -> Self {
        Error::Service {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if this error means the object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns true if this error left observable state behind
    pub fn is_partial(&self) -> bool {
        matches!(self, Error::PartialOperation { .. })
    }

    /// Re-label a `NotFound` raised for an object key with the caller's logical path.
    ///
    /// Every other variant is returned unchanged.
    pub fn with_path(self, path: &str) -> Self {
        match self {
            Error::NotFound { .. } => Error::NotFound {
                path: path.to_string(),
            },
            other => other,
        }
    }
}
