//! Seams to the external GraphQL engine.
//!
//! This crate never parses or executes GraphQL itself. An engine supplies a
//! parser for documents and a promise-producing execution entry point.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::promise::Promise;
use crate::result::{ExecutionResult, OperationError};

/// The kind of a GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    /// Returns the keyword used in documents.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed executable document.
pub trait Document: Send + Sync + 'static {
    /// Returns the type of the operation selected by `operation_name`.
    ///
    /// With no name the document's only operation is selected. `None` means
    /// no operation matches.
    fn operation_type(&self, operation_name: Option<&str>) -> Option<OperationType>;
}

/// Parses source text into a document.
pub trait DocumentParser: Send + Sync + 'static {
    type Document: Document + Clone;

    /// Parses `source`, failing with a located syntax error.
    fn parse(&self, source: &str) -> Result<Self::Document, OperationError>;
}

/// Everything the engine needs to execute one operation.
pub struct ExecutionRequest<E: ExecutionEngine + ?Sized> {
    pub schema: Arc<E::Schema>,
    pub document: E::Document,
    pub root_value: Value,
    pub context: Value,
    pub variables: Option<Map<String, Value>>,
    pub operation_name: Option<String>,
    pub field_resolver: Option<E::FieldResolver>,
    pub validation_rules: Vec<E::ValidationRule>,
}

impl<E: ExecutionEngine + ?Sized> fmt::Debug for ExecutionRequest<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionRequest")
            .field("root_value", &self.root_value)
            .field("context", &self.context)
            .field("variables", &self.variables)
            .field("operation_name", &self.operation_name)
            .field("field_resolver", &self.field_resolver.is_some())
            .field("validation_rules", &self.validation_rules.len())
            .finish_non_exhaustive()
    }
}

/// Executes parsed documents against a schema.
///
/// Field and validation errors are reported inside the returned
/// [`ExecutionResult`], never by panicking.
pub trait ExecutionEngine: DocumentParser {
    type Schema: Send + Sync + 'static;
    type FieldResolver: Clone + Send + Sync + 'static;
    type ValidationRule: Clone + Send + Sync + 'static;

    fn execute(&self, request: ExecutionRequest<Self>) -> Promise<ExecutionResult>;
}
