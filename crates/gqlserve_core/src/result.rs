//! Execution results and the errors they carry.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::{ErrorCategory, RequestError};
use crate::format::{self, ErrorFormatter, ErrorsHandler};

/// A position in a GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

impl Location {
    /// Creates a new location.
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// A field name or alias.
    Key(String),
    /// A list index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        Self::Key(s.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        Self::Key(s)
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

/// One error reported for an operation.
#[derive(Debug, Clone)]
pub struct OperationError {
    /// Human-readable error message.
    pub message: String,
    /// Document locations the error refers to.
    pub locations: Vec<Location>,
    /// Response path of the field that failed.
    pub path: Option<Vec<PathSegment>>,
    /// Extension data sent to clients.
    pub extensions: Option<Map<String, Value>>,
    /// Error category.
    pub category: ErrorCategory,
    /// Per-field validation messages.
    pub validation: Option<Map<String, Value>>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl OperationError {
    /// Creates a new engine-level error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
            extensions: None,
            category: ErrorCategory::Graphql,
            validation: None,
            source: None,
        }
    }

    /// Creates an error whose message is hidden from clients.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message).with_category(ErrorCategory::Internal)
    }

    /// Creates a syntax error located in the document.
    pub fn syntax(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::new(format!("Syntax Error: {}", message.into())).with_location(line, column)
    }

    /// Adds a location.
    pub fn with_location(mut self, line: usize, column: usize) -> Self {
        self.locations.push(Location::new(line, column));
        self
    }

    /// Sets the response path.
    pub fn with_path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        self.path = Some(path.into_iter().map(Into::into).collect());
        self
    }

    /// Adds extension data.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.extensions
                .get_or_insert_with(Map::new)
                .insert(key.into(), v);
        }
        self
    }

    /// Sets the category.
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    /// Attaches validation messages for a single input field.
    pub fn with_validation<I, S>(mut self, field: impl Into<String>, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages = messages
            .into_iter()
            .map(|m| Value::String(m.into()))
            .collect();
        self.validation
            .get_or_insert_with(Map::new)
            .insert(field.into(), Value::Array(messages));
        self
    }

    /// Records the error that caused this one.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns true if the message may be shown to clients.
    pub fn is_client_safe(&self) -> bool {
        self.category.is_client_safe()
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for OperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<RequestError> for OperationError {
    fn from(error: RequestError) -> Self {
        Self::new(error.message).with_category(ErrorCategory::Request)
    }
}

/// Outcome of executing one operation.
///
/// Serializes to `{"data": ..., "errors": [...], "extensions": {...}}`;
/// `errors` and `extensions` are omitted when empty. Errors are rendered with
/// the attached formatter and handler, or the defaults.
#[derive(Clone, Default)]
pub struct ExecutionResult {
    /// Result data, `None` when execution did not produce any.
    pub data: Option<Value>,
    /// Errors in the order they were reported.
    pub errors: Vec<OperationError>,
    /// Extension data.
    pub extensions: Option<Map<String, Value>>,
    error_formatter: Option<ErrorFormatter>,
    errors_handler: Option<ErrorsHandler>,
}

impl ExecutionResult {
    /// Creates a successful result.
    pub fn new(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Creates a result that carries only errors.
    pub fn from_errors(errors: Vec<OperationError>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    /// Creates a result for a single failure that happened before execution.
    pub fn from_error(error: impl Into<OperationError>) -> Self {
        Self::from_errors(vec![error.into()])
    }

    /// Adds errors.
    pub fn with_errors(mut self, errors: impl IntoIterator<Item = OperationError>) -> Self {
        self.errors.extend(errors);
        self
    }

    /// Adds an extension entry.
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Returns true if any error was reported.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true if the data is absent or `null`.
    pub fn data_is_null(&self) -> bool {
        matches!(self.data, None | Some(Value::Null))
    }

    /// Returns true if the operation failed before producing any data.
    pub fn is_fatal(&self) -> bool {
        self.data_is_null() && self.has_errors()
    }

    /// Sets the formatter used for every error on serialization.
    pub fn set_error_formatter(&mut self, formatter: ErrorFormatter) -> &mut Self {
        self.error_formatter = Some(formatter);
        self
    }

    /// Sets the handler that maps the whole error list on serialization.
    pub fn set_errors_handler(&mut self, handler: ErrorsHandler) -> &mut Self {
        self.errors_handler = Some(handler);
        self
    }

    /// Returns true if a formatter was attached.
    pub fn has_error_formatter(&self) -> bool {
        self.error_formatter.is_some()
    }

    /// Returns true if an errors handler was attached.
    pub fn has_errors_handler(&self) -> bool {
        self.errors_handler.is_some()
    }

    /// Renders the errors with the attached formatter and handler.
    pub fn formatted_errors(&self) -> Vec<Value> {
        let formatter = self
            .error_formatter
            .clone()
            .unwrap_or_else(format::default_formatter);
        match &self.errors_handler {
            Some(handler) => handler(&self.errors, &formatter),
            None => self
                .errors
                .iter()
                .map(|e| Value::Object(formatter(e)))
                .collect(),
        }
    }

    /// Converts the result to its response JSON.
    pub fn to_json(&self) -> Value {
        let mut result = Map::new();
        result.insert("data".to_string(), self.data.clone().unwrap_or(Value::Null));
        if self.has_errors() {
            result.insert("errors".to_string(), Value::Array(self.formatted_errors()));
        }
        if let Some(extensions) = self.extensions.as_ref().filter(|e| !e.is_empty()) {
            result.insert("extensions".to_string(), Value::Object(extensions.clone()));
        }
        Value::Object(result)
    }
}

impl fmt::Debug for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionResult")
            .field("data", &self.data)
            .field("errors", &self.errors)
            .field("extensions", &self.extensions)
            .field("error_formatter", &self.error_formatter.is_some())
            .field("errors_handler", &self.errors_handler.is_some())
            .finish()
    }
}

impl Serialize for ExecutionResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let has_extensions = self.extensions.as_ref().is_some_and(|e| !e.is_empty());
        let len = 1 + usize::from(self.has_errors()) + usize::from(has_extensions);

        let mut state = serializer.serialize_map(Some(len))?;
        state.serialize_entry("data", &self.data)?;
        if self.has_errors() {
            state.serialize_entry("errors", &self.formatted_errors())?;
        }
        if has_extensions {
            state.serialize_entry("extensions", &self.extensions)?;
        }
        state.end()
    }
}
