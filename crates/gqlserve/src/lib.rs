//! # gqlserve
//!
//! The GraphQL-over-HTTP protocol layer. It turns HTTP requests into
//! GraphQL operations, hands them to an external engine, and turns the
//! results back into HTTP responses.
//!
//! ## Features
//!
//! - **Decoding**: GET query strings, JSON bodies, `application/graphql`,
//!   url-encoded and multipart forms
//! - **Batching**: JSON array bodies run as independent operations
//! - **Persisted queries**: `queryId` resolved through a loader
//! - **Sync or async**: one code path, resolved in-process or on your executor
//! - **Error isolation**: client mistakes stay in the response body; only
//!   configuration defects become a 500
//!
//! ## Quick Start
//!
//! ```ignore
//! use gqlserve::{serve, HttpConfig, PromiseAdapter, ServerConfig, StandardServer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new(MyEngine::default())
//!         .schema(my_schema())
//!         .query_batching(true)
//!         .promise_adapter(PromiseAdapter::Async);
//!
//!     let server = Arc::new(StandardServer::new(config));
//!     serve(server, HttpConfig::new().port(4000)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod events;
pub mod http;
pub mod persisted;
pub mod request;
pub mod response;
pub mod server;
pub mod validation;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
mod testing;

pub use config::{
    BatchContext, Computed, PersistedQuery, PersistedQueryLoader, Resolvable, ServerConfig,
    ValidationRules,
};
pub use coordinator::{
    apply_error_handling, ExecutionCoordinator, BATCHING_DISABLED_MESSAGE, GET_QUERY_ONLY_MESSAGE,
    SCHEMA_REQUIRED_MESSAGE,
};
pub use events::{ExecutionListener, QueryExecutionStarted, RequestResolved};
pub use http::{serve, serve_listener, HttpConfig, TransportError};
pub use persisted::PersistedQueryResolver;
pub use request::{DecodedBody, HttpRequest, RequestDecoder};
pub use response::{ExecutionOutcome, ResponseEncoder};
pub use server::StandardServer;
pub use validation::{OperationValidator, QuerySource, ValidOperation};

pub use gqlserve_core::{
    DebugFlags, Document, DocumentParser, ErrorCategory, ErrorFormatter, ErrorsHandler,
    ExecutionEngine, ExecutionRequest, ExecutionResult, InvariantViolation, OperationError,
    OperationParams, OperationType, Promise, PromiseAdapter, RequestError, ServerError,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        DecodedBody, ExecutionEngine, ExecutionOutcome, ExecutionResult, HttpConfig, HttpRequest,
        OperationError, OperationParams, PromiseAdapter, ResponseEncoder, ServerConfig,
        StandardServer,
    };
}
