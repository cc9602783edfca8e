//! Execution coordination.
//!
//! Drives one operation, or a batch of them, from validated params to a
//! [`Promise`] of an [`ExecutionResult`]. Everything the client did wrong is
//! folded into the result; only [`InvariantViolation`]s escape.

use gqlserve_core::{
    prepare_formatter, Document, ExecutionEngine, ExecutionRequest, ExecutionResult,
    InvariantViolation, OperationError, OperationParams, OperationType, Promise, PromiseAdapter,
    RequestError, ServerError, ServerResult,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, debug_span, info_span, warn};

use crate::config::{BatchContext, ServerConfig};
use crate::events::QueryExecutionStarted;
use crate::persisted::PersistedQueryResolver;
use crate::validation::{OperationValidator, QuerySource};

pub const SCHEMA_REQUIRED_MESSAGE: &str = "Schema is required for the server";
pub const BATCHING_DISABLED_MESSAGE: &str = "Batched queries are not supported by this server";
pub const GET_QUERY_ONLY_MESSAGE: &str = "GET supports only query operation";

/// Runs operations against a [`ServerConfig`].
pub struct ExecutionCoordinator<'a, E: ExecutionEngine> {
    config: &'a ServerConfig<E>,
    adapter: PromiseAdapter,
}

impl<'a, E: ExecutionEngine> ExecutionCoordinator<'a, E> {
    /// Creates a coordinator using the configured promise adapter.
    pub fn new(config: &'a ServerConfig<E>) -> Self {
        Self {
            config,
            adapter: config.promise_adapter,
        }
    }

    /// Overrides the promise adapter for this coordinator only.
    pub fn with_adapter(mut self, adapter: PromiseAdapter) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn adapter(&self) -> PromiseAdapter {
        self.adapter
    }

    /// Executes one operation, waiting for it under the synchronous adapter.
    pub fn execute_operation(
        &self,
        params: OperationParams,
    ) -> Result<Promise<ExecutionResult>, InvariantViolation> {
        let result = self.run(params)?;
        Ok(self.adapter.wait(result))
    }

    /// Executes a batch, waiting for it under the synchronous adapter.
    ///
    /// Results keep the order of `operations`. A batch is rejected as a whole
    /// when batching is disabled.
    pub fn execute_batch(
        &self,
        operations: Vec<OperationParams>,
    ) -> ServerResult<Promise<Vec<ExecutionResult>>> {
        let results = self.run_batch(operations)?;
        Ok(self.adapter.wait(results))
    }

    /// Prepares and starts one operation.
    pub fn run(&self, params: OperationParams) -> Result<Promise<ExecutionResult>, InvariantViolation> {
        run_operation(self.config, &params, None)
    }

    /// Prepares and starts every operation of a batch.
    ///
    /// Each entry sees the configured context as `viewer` next to its
    /// `batchIndex`.
    pub fn run_batch(
        &self,
        operations: Vec<OperationParams>,
    ) -> ServerResult<Promise<Vec<ExecutionResult>>> {
        require_schema(self.config)?;
        if !self.config.query_batching {
            warn!(size = operations.len(), "Rejecting batched request");
            return Err(RequestError::new(BATCHING_DISABLED_MESSAGE).into());
        }

        let span = info_span!("graphql_batch", size = operations.len());
        let _entered = span.enter();

        let batch = BatchContext::new(self.config.context.clone());
        let mut results = Vec::with_capacity(operations.len());
        for (index, params) in operations.iter().enumerate() {
            let mut entry_config = self.config.clone();
            entry_config.context = Some(batch.for_entry(index));
            results.push(run_operation(&entry_config, params, Some(index))?);
        }
        Ok(self.adapter.all(results))
    }

    /// Folds an error raised outside a single operation into a result.
    pub fn fold_error(&self, error: ServerError) -> Result<Promise<ExecutionResult>, InvariantViolation> {
        let error = error.into_operation_error()?;
        let result = self
            .adapter
            .create_fulfilled(ExecutionResult::from_error(error));
        Ok(apply_error_handling(result, self.config))
    }
}

/// Attaches the configured error formatter and handler to the eventual result.
pub fn apply_error_handling<E: ExecutionEngine>(
    result: Promise<ExecutionResult>,
    config: &ServerConfig<E>,
) -> Promise<ExecutionResult> {
    let handler = config.errors_handler.clone();
    let formatter = (config.error_formatter.is_some() || !config.debug.is_empty())
        .then(|| prepare_formatter(config.error_formatter.clone(), config.debug));
    if handler.is_none() && formatter.is_none() {
        return result;
    }

    result.then(move |mut result| {
        if let Some(handler) = handler {
            result.set_errors_handler(handler);
        }
        if let Some(formatter) = formatter {
            result.set_error_formatter(formatter);
        }
        result
    })
}

fn run_operation<E: ExecutionEngine>(
    config: &ServerConfig<E>,
    params: &OperationParams,
    batch_index: Option<usize>,
) -> Result<Promise<ExecutionResult>, InvariantViolation> {
    let span = debug_span!("graphql_operation", batch_index = ?batch_index);
    let _entered = span.enter();

    let result = match prepare_and_execute(config, params, batch_index) {
        Ok(result) => result,
        Err(error) => {
            let error: OperationError = error.into_operation_error()?;
            debug!(error = %error, "Operation rejected before execution");
            Promise::fulfilled(ExecutionResult::from_error(error))
        }
    };
    Ok(apply_error_handling(result, config))
}

fn prepare_and_execute<E: ExecutionEngine>(
    config: &ServerConfig<E>,
    params: &OperationParams,
    batch_index: Option<usize>,
) -> ServerResult<Promise<ExecutionResult>> {
    let schema = require_schema(config)?;

    let operation = match OperationValidator::check(params) {
        Ok(operation) => operation,
        Err(errors) => {
            debug!(count = errors.len(), "Invalid operation params");
            let errors = errors.into_iter().map(OperationError::from).collect();
            return Ok(Promise::fulfilled(ExecutionResult::from_errors(errors)));
        }
    };

    let document = match &operation.source {
        QuerySource::Inline(query) => config.engine.parse(query)?,
        QuerySource::Persisted(query_id) => PersistedQueryResolver::load_document(
            config.engine.as_ref(),
            config.persisted_query_loader.as_ref(),
            query_id,
            params,
        )?,
    };

    let operation_type = document.operation_type(operation.operation_name.as_deref());
    if params.read_only && operation_type != Some(OperationType::Query) {
        return Err(RequestError::new(GET_QUERY_ONLY_MESSAGE).into());
    }

    let root_value = config
        .root_value
        .as_ref()
        .map_or(Value::Null, |r| r.resolve(params, &document, operation_type));
    let context = config
        .context
        .as_ref()
        .map_or(Value::Null, |c| c.resolve(params, &document, operation_type));
    let validation_rules = match &config.validation_rules {
        Some(rules) => rules.resolve(params, &document, operation_type)?,
        None => Vec::new(),
    };

    if let Some(listener) = &config.listener {
        listener.query_execution_started(&QueryExecutionStarted {
            query: params.query(),
            query_id: params.query_id(),
            operation_name: operation.operation_name.as_deref(),
            operation_type,
            variables: operation.variables.as_ref(),
            batch_index,
        });
    }
    debug!(
        operation_name = operation.operation_name.as_deref(),
        operation_type = ?operation_type,
        "Executing operation"
    );

    Ok(config.engine.execute(ExecutionRequest {
        schema,
        document,
        root_value,
        context,
        variables: operation.variables,
        operation_name: operation.operation_name,
        field_resolver: config.field_resolver.clone(),
        validation_rules,
    }))
}

fn require_schema<E: ExecutionEngine>(
    config: &ServerConfig<E>,
) -> Result<Arc<E::Schema>, InvariantViolation> {
    config
        .schema
        .clone()
        .ok_or_else(|| InvariantViolation::new(SCHEMA_REQUIRED_MESSAGE))
}
