//! Error taxonomy for the GraphQL-over-HTTP layer.
//!
//! Request errors describe malformed client input and always end up in-band,
//! inside an `ExecutionResult`. Invariant violations describe configuration
//! or programming defects and abort the whole request.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::result::OperationError;

/// Category attached to every operation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Malformed or unsupported request input.
    Request,
    /// Syntax, validation or field errors reported by the engine.
    Graphql,
    /// Anything that should not be shown verbatim to clients.
    Internal,
}

impl ErrorCategory {
    /// Returns the string representation of the category.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Graphql => "graphql",
            Self::Internal => "internal",
        }
    }

    /// Returns true if messages in this category may be sent to clients as-is.
    pub const fn is_client_safe(&self) -> bool {
        !matches!(self, Self::Internal)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed or invalid client input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RequestError {
    /// Human-readable error message.
    pub message: String,
}

impl RequestError {
    /// Creates a new request error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A configuration or programming defect. Never folded into a result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct InvariantViolation {
    /// Human-readable error message.
    pub message: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Any error raised while preparing an operation for execution.
#[derive(Error, Debug, Clone)]
pub enum ServerError {
    /// Client input was rejected.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// The engine rejected the document (e.g. a syntax error).
    #[error(transparent)]
    Graphql(#[from] OperationError),
    /// Configuration or programming defect.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl ServerError {
    /// Returns true if the error must abort the whole request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Converts the error into an in-band operation error, or hands the
    /// invariant violation back to the caller.
    pub fn into_operation_error(self) -> Result<OperationError, InvariantViolation> {
        match self {
            Self::Request(error) => Ok(OperationError::from(error)),
            Self::Graphql(error) => Ok(error),
            Self::Invariant(violation) => Err(violation),
        }
    }
}

/// Type alias for results produced while preparing an operation.
pub type ServerResult<T> = std::result::Result<T, ServerError>;
