//! Normalized operation parameters extracted from a request.

use serde_json::{Map, Value};

/// Default name of the field carrying variables.
pub const DEFAULT_VARIABLES_FIELD: &str = "variables";

/// One GraphQL operation as sent by the client.
///
/// Values are kept as decoded so that validation can report type errors;
/// use the typed accessors once the params have been validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationParams {
    pub query: Option<Value>,
    pub query_id: Option<Value>,
    pub operation_name: Option<Value>,
    pub variables: Option<Value>,
    pub extensions: Option<Value>,
    /// Set for GET requests, which may only run queries.
    pub read_only: bool,
    original_input: Map<String, Value>,
    variables_field: String,
}

impl OperationParams {
    /// Creates empty params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates params for an inline query.
    pub fn from_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(Value::String(query.into())),
            ..Self::default()
        }
    }

    /// Creates params for a persisted query.
    pub fn from_query_id(query_id: impl Into<String>) -> Self {
        Self {
            query_id: Some(Value::String(query_id.into())),
            ..Self::default()
        }
    }

    /// Builds params from a decoded key/value map.
    ///
    /// Keys match case-insensitively. `queryId` is also accepted as
    /// `documentId` or `id`, and `operationName` as `operation`. Variables
    /// and extensions given as JSON strings are parsed; an empty string
    /// counts as absent.
    pub fn from_map(input: Map<String, Value>, read_only: bool, variables_field: &str) -> Self {
        let lookup = |name: &str| {
            input
                .iter()
                .find(|(k, v)| k.eq_ignore_ascii_case(name) && !v.is_null())
                .map(|(_, v)| v.clone())
        };

        let query = lookup("query");
        let query_id = lookup("documentId")
            .or_else(|| lookup("queryId"))
            .or_else(|| lookup("id"));
        let operation_name = lookup("operationName").or_else(|| lookup("operation"));
        let variables = lookup(variables_field).and_then(|v| decode_json_string(&v));
        let extensions = lookup("extensions").and_then(|v| decode_json_string(&v));

        Self {
            query,
            query_id,
            operation_name,
            variables,
            extensions,
            read_only,
            original_input: input,
            variables_field: variables_field.to_string(),
        }
    }

    /// Sets the operation name.
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(Value::String(name.into()));
        self
    }

    /// Sets the variables.
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self.variables_field.clear();
        self
    }

    /// Marks the params as read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Returns the query text, if it is a string.
    pub fn query(&self) -> Option<&str> {
        self.query.as_ref().and_then(Value::as_str)
    }

    /// Returns the persisted query id, if it is a string.
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_ref().and_then(Value::as_str)
    }

    /// Returns the operation name, if it is a string.
    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_ref().and_then(Value::as_str)
    }

    /// Returns the variables, if they are an object.
    pub fn variables(&self) -> Option<&Map<String, Value>> {
        self.variables.as_ref().and_then(Value::as_object)
    }

    /// Returns the extensions, if they are an object.
    pub fn extensions(&self) -> Option<&Map<String, Value>> {
        self.extensions.as_ref().and_then(Value::as_object)
    }

    /// Returns a value exactly as the client sent it.
    pub fn original_input(&self, key: &str) -> Option<&Value> {
        self.original_input
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Returns the variables exactly as the client sent them, before any
    /// JSON string was parsed.
    pub fn original_variables(&self) -> Option<&Value> {
        if self.variables_field.is_empty() {
            return None;
        }
        self.original_input(&self.variables_field)
            .filter(|v| !v.is_null())
    }
}

fn decode_json_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Null) => None,
            Ok(parsed) => Some(parsed),
            Err(_) => Some(value.clone()),
        },
        other => Some(other.clone()),
    }
}
