//! Execution events.
//!
//! Listeners observe the protocol layer without taking part in it. Both
//! hooks have empty default bodies so implementors pick what they need.

use gqlserve_core::{OperationError, OperationType};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::response::ExecutionOutcome;

/// Emitted right before an operation is handed to the engine.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutionStarted<'a> {
    pub query: Option<&'a str>,
    pub query_id: Option<&'a str>,
    pub operation_name: Option<&'a str>,
    pub operation_type: Option<OperationType>,
    pub variables: Option<&'a Map<String, Value>>,
    /// Position in the batch, `None` for single requests.
    pub batch_index: Option<usize>,
}

/// Emitted once a request has produced its final outcome.
#[derive(Debug, Clone, Copy)]
pub struct RequestResolved<'a> {
    pub outcome: &'a ExecutionOutcome,
}

impl RequestResolved<'_> {
    /// Errors across every result of the request.
    pub fn errors(&self) -> impl Iterator<Item = &OperationError> {
        self.outcome.errors()
    }

    /// Returns true if any result carries errors.
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

/// Receives execution events.
pub trait ExecutionListener: Send + Sync {
    fn query_execution_started(&self, _event: &QueryExecutionStarted<'_>) {}

    fn request_resolved(&self, _event: &RequestResolved<'_>) {}
}

impl<T: ExecutionListener + ?Sized> ExecutionListener for Arc<T> {
    fn query_execution_started(&self, event: &QueryExecutionStarted<'_>) {
        (**self).query_execution_started(event);
    }

    fn request_resolved(&self, event: &RequestResolved<'_>) {
        (**self).request_resolved(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlserve_core::ExecutionResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        started: AtomicUsize,
        resolved: AtomicUsize,
    }

    impl ExecutionListener for Counting {
        fn query_execution_started(&self, _event: &QueryExecutionStarted<'_>) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn request_resolved(&self, event: &RequestResolved<'_>) {
            if event.has_errors() {
                self.resolved.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_default_hooks_are_noops() {
        struct Silent;
        impl ExecutionListener for Silent {}

        let outcome = ExecutionOutcome::Single(ExecutionResult::new(Value::Null));
        Silent.request_resolved(&RequestResolved { outcome: &outcome });
    }

    #[test]
    fn test_resolved_errors_span_batch() {
        let outcome = ExecutionOutcome::Batch(vec![
            ExecutionResult::new(Value::Null),
            ExecutionResult::from_error(OperationError::new("boom")),
        ]);
        let listener = Counting::default();
        let event = RequestResolved { outcome: &outcome };
        assert_eq!(event.errors().count(), 1);

        listener.request_resolved(&event);
        listener.query_execution_started(&QueryExecutionStarted {
            query: Some("{ a }"),
            query_id: None,
            operation_name: None,
            operation_type: Some(OperationType::Query),
            variables: None,
            batch_index: None,
        });
        assert_eq!(listener.resolved.load(Ordering::SeqCst), 1);
        assert_eq!(listener.started.load(Ordering::SeqCst), 1);
    }
}
