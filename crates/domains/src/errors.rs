//! # Errors
//!
//! One error enum per port. Services convert these into local state at the
//! call site; nothing here is meant to reach a global handler.

use thiserror::Error;

/// Failure reported by a [`crate::DataClient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// The backend answered with its specific "no such row" code.
    #[error("{table} row {id} not found")]
    NotFound { table: String, id: String },

    /// Network or service failure.
    #[error("{table}: {message}")]
    Backend { table: String, message: String },

    /// A row came back in a shape the caller could not decode.
    #[error("malformed row in {table}: {message}")]
    Malformed { table: String, message: String },
}

impl DataError {
    pub fn backend(table: &str, message: impl ToString) -> Self {
        Self::Backend {
            table: table.to_string(),
            message: message.to_string(),
        }
    }

    pub fn not_found(table: &str, id: &str) -> Self {
        Self::NotFound {
            table: table.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failure reported by an [`crate::ObjectStorage`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("upload of {path} failed: {message}")]
    Upload { path: String, message: String },
}

/// Failure reported by an [`crate::AuthProvider`] or [`crate::SessionResolver`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("sign-in failed: {0}")]
    SignIn(String),

    #[error("sign-out failed: {0}")]
    SignOut(String),

    #[error("invalid session token: {0}")]
    InvalidToken(String),
}

/// A specialized Result type for data-service calls.
pub type Result<T, E = DataError> = std::result::Result<T, E>;
