//! Server configuration.
//!
//! Built once, then read by every operation of a request. Fields that may
//! depend on the request (`root_value`, `context`, `validation_rules`) are
//! either a plain value or a function of the operation.

use gqlserve_core::{
    DebugFlags, ErrorFormatter, ErrorsHandler, ExecutionEngine, InvariantViolation, OperationError,
    OperationParams, OperationType, PromiseAdapter, RequestError, DEFAULT_VARIABLES_FIELD,
};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::events::ExecutionListener;

/// A function of the operation being executed.
pub type Computed<T, D> =
    Arc<dyn Fn(&OperationParams, &D, Option<OperationType>) -> T + Send + Sync>;

/// A configuration value that is either fixed or computed per operation.
pub enum Resolvable<T, D> {
    Value(T),
    Computed(Computed<T, D>),
}

impl<T: Clone, D> Resolvable<T, D> {
    /// Wraps a function of `(params, document, operation_type)`.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&OperationParams, &D, Option<OperationType>) -> T + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(f))
    }

    /// Produces the value for one operation.
    pub fn resolve(
        &self,
        params: &OperationParams,
        document: &D,
        operation_type: Option<OperationType>,
    ) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::Computed(f) => f(params, document, operation_type),
        }
    }
}

impl<T: Clone, D> Clone for Resolvable<T, D> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Computed(f) => Self::Computed(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug, D> fmt::Debug for Resolvable<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed"),
        }
    }
}

/// Validation rules, fixed or chosen per operation.
///
/// A computed variant returning `None` is a configuration defect.
pub enum ValidationRules<R, D> {
    List(Vec<R>),
    Computed(Computed<Option<Vec<R>>, D>),
}

impl<R: Clone, D> ValidationRules<R, D> {
    /// Produces the rules for one operation.
    pub fn resolve(
        &self,
        params: &OperationParams,
        document: &D,
        operation_type: Option<OperationType>,
    ) -> Result<Vec<R>, InvariantViolation> {
        match self {
            Self::List(rules) => Ok(rules.clone()),
            Self::Computed(f) => f(params, document, operation_type).ok_or_else(|| {
                InvariantViolation::new(
                    "Expecting validation rules to be a list or a function returning a list, but got: null",
                )
            }),
        }
    }
}

impl<R: Clone, D> Clone for ValidationRules<R, D> {
    fn clone(&self) -> Self {
        match self {
            Self::List(rules) => Self::List(rules.clone()),
            Self::Computed(f) => Self::Computed(Arc::clone(f)),
        }
    }
}

/// What a persisted query loader may hand back.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedQuery<D> {
    /// Source text still to be parsed.
    Source(String),
    /// An already parsed document.
    Document(D),
}

/// Loads persisted queries by id.
///
/// `Err` rejects the id in-band; `Ok(None)` is a configuration defect.
pub type PersistedQueryLoader<D> = Arc<
    dyn Fn(&str, &OperationParams) -> Result<Option<PersistedQuery<D>>, RequestError> + Send + Sync,
>;

/// Configuration shared by every operation of a request.
pub struct ServerConfig<E: ExecutionEngine> {
    /// Engine used to parse and execute documents.
    pub engine: Arc<E>,
    /// Schema operations run against. Required.
    pub schema: Option<Arc<E::Schema>>,
    /// Root value handed to top-level resolvers.
    pub root_value: Option<Resolvable<Value, E::Document>>,
    /// Context handed to every resolver.
    pub context: Option<Resolvable<Value, E::Document>>,
    /// Default field resolver.
    pub field_resolver: Option<E::FieldResolver>,
    /// Validation rules, engine defaults when unset.
    pub validation_rules: Option<ValidationRules<E::ValidationRule, E::Document>>,
    /// Accept batched requests.
    pub query_batching: bool,
    /// Debug output switches.
    pub debug: DebugFlags,
    /// Loader for `queryId` requests.
    pub persisted_query_loader: Option<PersistedQueryLoader<E::Document>>,
    /// Formatter applied to every error.
    pub error_formatter: Option<ErrorFormatter>,
    /// Handler applied to the whole error list.
    pub errors_handler: Option<ErrorsHandler>,
    /// How pending results are resolved.
    pub promise_adapter: PromiseAdapter,
    /// Name of the request field carrying variables.
    pub variables_field: String,
    /// Receives execution events.
    pub listener: Option<Arc<dyn ExecutionListener>>,
}

impl<E: ExecutionEngine> ServerConfig<E> {
    /// Creates a config with default values.
    pub fn new(engine: E) -> Self {
        Self::with_engine(Arc::new(engine))
    }

    /// Creates a config around a shared engine.
    pub fn with_engine(engine: Arc<E>) -> Self {
        Self {
            engine,
            schema: None,
            root_value: None,
            context: None,
            field_resolver: None,
            validation_rules: None,
            query_batching: false,
            debug: DebugFlags::NONE,
            persisted_query_loader: None,
            error_formatter: None,
            errors_handler: None,
            promise_adapter: PromiseAdapter::Sync,
            variables_field: DEFAULT_VARIABLES_FIELD.to_string(),
            listener: None,
        }
    }

    /// Sets the schema.
    pub fn schema(mut self, schema: E::Schema) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Sets a shared schema.
    pub fn shared_schema(mut self, schema: Arc<E::Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Sets a fixed root value.
    pub fn root_value(mut self, root_value: Value) -> Self {
        self.root_value = Some(Resolvable::Value(root_value));
        self
    }

    /// Computes the root value per operation.
    pub fn root_value_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationParams, &E::Document, Option<OperationType>) -> Value + Send + Sync + 'static,
    {
        self.root_value = Some(Resolvable::computed(f));
        self
    }

    /// Sets a fixed context.
    pub fn context(mut self, context: Value) -> Self {
        self.context = Some(Resolvable::Value(context));
        self
    }

    /// Computes the context per operation.
    pub fn context_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationParams, &E::Document, Option<OperationType>) -> Value + Send + Sync + 'static,
    {
        self.context = Some(Resolvable::computed(f));
        self
    }

    /// Sets the default field resolver.
    pub fn field_resolver(mut self, resolver: E::FieldResolver) -> Self {
        self.field_resolver = Some(resolver);
        self
    }

    /// Sets fixed validation rules.
    pub fn validation_rules(mut self, rules: Vec<E::ValidationRule>) -> Self {
        self.validation_rules = Some(ValidationRules::List(rules));
        self
    }

    /// Chooses validation rules per operation.
    pub fn validation_rules_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&OperationParams, &E::Document, Option<OperationType>) -> Option<Vec<E::ValidationRule>>
            + Send
            + Sync
            + 'static,
    {
        self.validation_rules = Some(ValidationRules::Computed(Arc::new(f)));
        self
    }

    /// Enables or disables batched requests.
    pub fn query_batching(mut self, enabled: bool) -> Self {
        self.query_batching = enabled;
        self
    }

    /// Sets the debug flags.
    pub fn debug(mut self, debug: impl Into<DebugFlags>) -> Self {
        self.debug = debug.into();
        self
    }

    /// Sets the persisted query loader.
    pub fn persisted_query_loader<F>(mut self, loader: F) -> Self
    where
        F: Fn(&str, &OperationParams) -> Result<Option<PersistedQuery<E::Document>>, RequestError>
            + Send
            + Sync
            + 'static,
    {
        self.persisted_query_loader = Some(Arc::new(loader));
        self
    }

    /// Sets the error formatter.
    pub fn error_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&OperationError) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.error_formatter = Some(Arc::new(formatter));
        self
    }

    /// Sets the errors handler.
    pub fn errors_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[OperationError], &ErrorFormatter) -> Vec<Value> + Send + Sync + 'static,
    {
        self.errors_handler = Some(Arc::new(handler));
        self
    }

    /// Sets the promise adapter.
    pub fn promise_adapter(mut self, adapter: PromiseAdapter) -> Self {
        self.promise_adapter = adapter;
        self
    }

    /// Sets the name of the request field carrying variables.
    pub fn variables_field(mut self, name: impl Into<String>) -> Self {
        self.variables_field = name.into();
        self
    }

    /// Sets the execution listener.
    pub fn listener(mut self, listener: impl ExecutionListener + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }
}

impl<E: ExecutionEngine> Clone for ServerConfig<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            schema: self.schema.clone(),
            root_value: self.root_value.clone(),
            context: self.context.clone(),
            field_resolver: self.field_resolver.clone(),
            validation_rules: self.validation_rules.clone(),
            query_batching: self.query_batching,
            debug: self.debug,
            persisted_query_loader: self.persisted_query_loader.clone(),
            error_formatter: self.error_formatter.clone(),
            errors_handler: self.errors_handler.clone(),
            promise_adapter: self.promise_adapter,
            variables_field: self.variables_field.clone(),
            listener: self.listener.clone(),
        }
    }
}

impl<E: ExecutionEngine> fmt::Debug for ServerConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("schema", &self.schema.is_some())
            .field("root_value", &self.root_value)
            .field("context", &self.context)
            .field("query_batching", &self.query_batching)
            .field("debug", &self.debug)
            .field("persisted_query_loader", &self.persisted_query_loader.is_some())
            .field("promise_adapter", &self.promise_adapter)
            .field("variables_field", &self.variables_field)
            .finish_non_exhaustive()
    }
}

/// Context of one batch entry: the configured context as `viewer`, plus the
/// entry's position.
#[derive(Debug, Clone)]
pub struct BatchContext<D> {
    viewer: Option<Resolvable<Value, D>>,
}

impl<D: 'static> BatchContext<D> {
    /// Wraps the configured context.
    pub fn new(viewer: Option<Resolvable<Value, D>>) -> Self {
        Self { viewer }
    }

    /// Returns the context for the entry at `batch_index`.
    pub fn for_entry(&self, batch_index: usize) -> Resolvable<Value, D> {
        match &self.viewer {
            None => Resolvable::Value(batch_value(Value::Null, batch_index)),
            Some(Resolvable::Value(viewer)) => {
                Resolvable::Value(batch_value(viewer.clone(), batch_index))
            }
            Some(Resolvable::Computed(f)) => {
                let f = Arc::clone(f);
                Resolvable::Computed(Arc::new(
                    move |params: &OperationParams, document: &D, operation_type: Option<OperationType>| {
                        batch_value(f(params, document, operation_type), batch_index)
                    },
                ))
            }
        }
    }
}

fn batch_value(viewer: Value, batch_index: usize) -> Value {
    serde_json::json!({ "viewer": viewer, "batchIndex": batch_index })
}
