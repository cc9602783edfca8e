//! Structural validation of operation parameters.
//!
//! Only the shape of the request is checked here. Document validation is
//! the engine's job.

use gqlserve_core::{OperationParams, RequestError};
use serde_json::{Map, Value};

/// Where the document of a validated operation comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    /// Query text sent by the client.
    Inline(String),
    /// Id to resolve through the persisted query loader.
    Persisted(String),
}

/// Typed view of params that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidOperation {
    pub source: QuerySource,
    pub operation_name: Option<String>,
    pub variables: Option<Map<String, Value>>,
}

/// Validates decoded operation parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationValidator;

impl OperationValidator {
    /// Reports every structural problem with `params`, in a fixed order.
    /// An empty list means the params are valid.
    pub fn validate(params: &OperationParams) -> Vec<RequestError> {
        let mut errors = Vec::new();

        let has_query = is_present(params.query.as_ref());
        let has_query_id = is_present(params.query_id.as_ref());
        if !has_query && !has_query_id {
            errors.push(RequestError::new(
                "GraphQL Request must include query or queryId",
            ));
        }
        if has_query && has_query_id {
            errors.push(RequestError::new(
                "GraphQL Request parameters query and queryId are mutually exclusive",
            ));
        }

        for (name, value) in [
            ("query", &params.query),
            ("queryId", &params.query_id),
            ("operationName", &params.operation_name),
        ] {
            if let Some(value) = value {
                if !is_non_empty_string(value) {
                    errors.push(type_error(name, "string", value));
                }
            }
        }

        if let Some(variables) = &params.variables {
            let valid = match variables {
                Value::Object(_) => true,
                Value::Array(items) => items.is_empty(),
                _ => false,
            };
            if !valid {
                errors.push(type_error(
                    "variables",
                    "object or JSON string parsed to object",
                    params.original_variables().unwrap_or(variables),
                ));
            }
        }

        errors
    }

    /// Validates `params` and returns the typed view on success.
    pub fn check(params: &OperationParams) -> Result<ValidOperation, Vec<RequestError>> {
        let errors = Self::validate(params);
        if !errors.is_empty() {
            return Err(errors);
        }

        let source = match (params.query(), params.query_id()) {
            (Some(query), _) => QuerySource::Inline(query.to_string()),
            (None, Some(id)) => QuerySource::Persisted(id.to_string()),
            (None, None) => {
                return Err(vec![RequestError::new(
                    "GraphQL Request must include query or queryId",
                )])
            }
        };

        Ok(ValidOperation {
            source,
            operation_name: params.operation_name().map(str::to_string),
            variables: params.variables().cloned(),
        })
    }
}

/// Mirrors the loose truthiness of form input: empty strings, `false`,
/// zero and empty containers count as absent.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Bool(true)) => true,
    }
}

fn is_non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}

fn type_error(name: &str, expected: &str, got: &Value) -> RequestError {
    RequestError::new(format!(
        "GraphQL Request parameter \"{name}\" must be {expected}, but got {got}"
    ))
}
