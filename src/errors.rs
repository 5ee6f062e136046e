//! Error types for rapid_controller
//!
//! This module defines the crate-level error type. Declaration and invocation
//! failures keep their structured form from [`crate::pipeline::errors`];
//! this enum only unifies them for callers that want a single `Result`.

use thiserror::Error;

use crate::pipeline::errors::{DeclarationError, InvocationError};

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Main error type for rapid_controller
#[derive(Error, Debug, Clone)]
pub enum ControllerError {
    /// The pipeline declaration is invalid and cannot be built
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// The framework rejected a pipeline invocation
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ControllerError {
    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Check if this error was raised while declaring a pipeline
    pub fn is_declaration(&self) -> bool {
        matches!(self, Self::Declaration(_))
    }
}

impl From<serde_json::Error> for ControllerError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
