//! Core data model for the gqlserve GraphQL-over-HTTP layer.
//!
//! - [`OperationParams`]: one operation as decoded from a request
//! - [`ExecutionResult`] / [`OperationError`]: what execution produced
//! - [`RequestError`] / [`InvariantViolation`]: the error taxonomy
//! - [`Promise`] / [`PromiseAdapter`]: sync and async execution behind one type
//! - [`ExecutionEngine`] / [`DocumentParser`]: the seams to the GraphQL engine

pub mod engine;
pub mod error;
pub mod format;
pub mod params;
pub mod promise;
pub mod result;

pub use engine::{Document, DocumentParser, ExecutionEngine, ExecutionRequest, OperationType};
pub use error::{ErrorCategory, InvariantViolation, RequestError, ServerError, ServerResult};
pub use format::{
    default_formatter, format_error, format_fatal, prepare_formatter, DebugFlags, ErrorFormatter,
    ErrorsHandler, INTERNAL_ERROR_MESSAGE,
};
pub use params::{OperationParams, DEFAULT_VARIABLES_FIELD};
pub use promise::{Promise, PromiseAdapter};
pub use result::{ExecutionResult, Location, OperationError, PathSegment};
