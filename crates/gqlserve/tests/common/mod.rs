//! A toy GraphQL engine for tests.
//!
//! Documents are flat: `[query|mutation|subscription [Name]] { field ... }`,
//! repeated for several operations. Fields resolve from the schema's map,
//! then the field resolver. A few reserved fields expose what the engine
//! was handed:
//! - `context`, `root`, `variables`, `rules`
//! - `boom` (field error), `unauthorized`, `internal` (masked error)

#![allow(dead_code)]

use gqlserve_core::{
    Document, DocumentParser, ExecutionEngine, ExecutionRequest, ExecutionResult,
    OperationError, OperationType, Promise,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ToySchema {
    fields: Map<String, Value>,
}

impl ToySchema {
    pub fn new<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToyOperation {
    pub name: Option<String>,
    pub kind: OperationType,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToyDocument {
    pub operations: Vec<ToyOperation>,
}

impl ToyDocument {
    fn select(&self, operation_name: Option<&str>) -> Option<&ToyOperation> {
        match operation_name {
            Some(name) => self
                .operations
                .iter()
                .find(|op| op.name.as_deref() == Some(name)),
            None if self.operations.len() == 1 => self.operations.first(),
            None => None,
        }
    }
}

impl Document for ToyDocument {
    fn operation_type(&self, operation_name: Option<&str>) -> Option<OperationType> {
        self.select(operation_name).map(|op| op.kind)
    }
}

pub type ToyResolver = fn(&str) -> Option<Value>;

#[derive(Debug, Clone, Default)]
pub struct ToyEngine {
    deferred: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl ToyEngine {
    /// An engine whose results are produced by a future.
    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    /// An engine whose results wait on a tokio timer first.
    pub fn sleeping(delay: Duration) -> Self {
        Self {
            deferred: true,
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Counter of `execute` calls.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl DocumentParser for ToyEngine {
    type Document = ToyDocument;

    fn parse(&self, source: &str) -> Result<ToyDocument, OperationError> {
        let mut operations = Vec::new();
        let mut offset = 0;

        while let Some(start) = source[offset..]
            .find(|c: char| !c.is_whitespace())
            .map(|i| offset + i)
        {
            let open = source[start..]
                .find('{')
                .map(|i| start + i)
                .ok_or_else(|| syntax_error(source, source.len(), "Expected \"{\", found <EOF>"))?;

            let header: Vec<&str> = source[start..open].split_whitespace().collect();
            let (kind, name) = match header.as_slice() {
                [] => (OperationType::Query, None),
                [keyword] => (operation_kind(source, start, keyword)?, None),
                [keyword, name] => (
                    operation_kind(source, start, keyword)?,
                    Some((*name).to_string()),
                ),
                _ => return Err(syntax_error(source, start, "Unexpected Name")),
            };

            let close = source[open + 1..]
                .find('}')
                .map(|i| open + 1 + i)
                .ok_or_else(|| syntax_error(source, source.len(), "Expected Name, found <EOF>"))?;
            let fields: Vec<String> = source[open + 1..close]
                .split_whitespace()
                .map(str::to_string)
                .collect();
            if fields.is_empty() {
                return Err(syntax_error(source, close, "Expected Name, found \"}\""));
            }

            operations.push(ToyOperation { name, kind, fields });
            offset = close + 1;
        }

        if operations.is_empty() {
            return Err(syntax_error(source, source.len(), "Unexpected <EOF>"));
        }
        Ok(ToyDocument { operations })
    }
}

impl ExecutionEngine for ToyEngine {
    type Schema = ToySchema;
    type FieldResolver = ToyResolver;
    type ValidationRule = String;

    fn execute(&self, request: ExecutionRequest<Self>) -> Promise<ExecutionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            Promise::from_future(async move {
                tokio::time::sleep(delay).await;
                resolve(&request)
            })
        } else if self.deferred {
            Promise::from_future(async move { resolve(&request) })
        } else {
            Promise::fulfilled(resolve(&request))
        }
    }
}

fn resolve(request: &ExecutionRequest<ToyEngine>) -> ExecutionResult {
    let operation_name = request.operation_name.as_deref();
    let Some(operation) = request.document.select(operation_name) else {
        let message = match operation_name {
            Some(name) => format!("Unknown operation named \"{name}\"."),
            None => "Must provide operation name if query contains multiple operations.".to_string(),
        };
        return ExecutionResult::from_error(OperationError::new(message));
    };

    let mut data = Map::new();
    let mut errors = Vec::new();
    for field in &operation.fields {
        let value = match field.as_str() {
            "context" => request.context.clone(),
            "root" => request.root_value.clone(),
            "variables" => request
                .variables
                .clone()
                .map_or(Value::Null, Value::Object),
            "rules" => Value::Array(
                request
                    .validation_rules
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            ),
            "boom" => {
                errors.push(OperationError::new("boom failed").with_path([field.as_str()]));
                Value::Null
            }
            "unauthorized" => {
                errors.push(OperationError::new("Unauthorized").with_path([field.as_str()]));
                Value::Null
            }
            "internal" => {
                errors.push(
                    OperationError::internal("connection refused").with_path([field.as_str()]),
                );
                Value::Null
            }
            name => {
                let resolved = request
                    .schema
                    .fields
                    .get(name)
                    .cloned()
                    .or_else(|| request.field_resolver.and_then(|r| r(name)));
                match resolved {
                    Some(value) => value,
                    None => {
                        return ExecutionResult::from_error(OperationError::new(format!(
                            "Cannot query field \"{name}\" on type \"Query\"."
                        )))
                    }
                }
            }
        };
        data.insert(field.clone(), value);
    }

    ExecutionResult::new(Value::Object(data)).with_errors(errors)
}

fn operation_kind(source: &str, offset: usize, keyword: &str) -> Result<OperationType, OperationError> {
    match keyword {
        "query" => Ok(OperationType::Query),
        "mutation" => Ok(OperationType::Mutation),
        "subscription" => Ok(OperationType::Subscription),
        other => Err(syntax_error(source, offset, &format!("Unexpected Name \"{other}\""))),
    }
}

fn syntax_error(source: &str, offset: usize, message: &str) -> OperationError {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(offset, |i| offset - i - 1) + 1;
    OperationError::syntax(message, line, column)
}
