//! The standard server: decode, execute, encode.

use bytes::Bytes;
use gqlserve_core::{ExecutionEngine, ExecutionResult, InvariantViolation, Promise, PromiseAdapter};
use http_body_util::Full;
use hyper::Response;
use std::io::{self, Write};
use tracing::{debug, info_span};

use crate::config::ServerConfig;
use crate::coordinator::{apply_error_handling, ExecutionCoordinator};
use crate::events::{ExecutionListener, RequestResolved};
use crate::request::{DecodedBody, HttpRequest, RequestDecoder};
use crate::response::{ExecutionOutcome, ResponseEncoder};

/// Serves GraphQL over HTTP for one configuration.
///
/// # Example
///
/// ```ignore
/// let config = ServerConfig::new(engine).schema(schema).query_batching(true);
/// let server = StandardServer::new(config);
///
/// let response = server.handle(&HttpRequest::get("query=%7B+hello+%7D")).await;
/// assert_eq!(response.status(), 200);
/// ```
pub struct StandardServer<E: ExecutionEngine> {
    config: ServerConfig<E>,
    decoder: RequestDecoder,
    encoder: ResponseEncoder,
}

impl<E: ExecutionEngine> StandardServer<E> {
    /// Creates a server with the default response encoder.
    pub fn new(config: ServerConfig<E>) -> Self {
        let decoder = RequestDecoder::new().variables_field(config.variables_field.clone());
        Self {
            config,
            decoder,
            encoder: ResponseEncoder::new(),
        }
    }

    /// Replaces the response encoder.
    pub fn with_encoder(mut self, encoder: ResponseEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &ServerConfig<E> {
        &self.config
    }

    pub fn decoder(&self) -> &RequestDecoder {
        &self.decoder
    }

    pub fn encoder(&self) -> &ResponseEncoder {
        &self.encoder
    }

    /// Executes already decoded operations.
    ///
    /// A batch rejected as a whole becomes a single error result.
    pub fn execute_request(
        &self,
        body: DecodedBody,
    ) -> Result<Promise<ExecutionOutcome>, InvariantViolation> {
        self.execute_request_with(body, self.config.promise_adapter)
    }

    fn execute_request_with(
        &self,
        body: DecodedBody,
        adapter: PromiseAdapter,
    ) -> Result<Promise<ExecutionOutcome>, InvariantViolation> {
        let coordinator = ExecutionCoordinator::new(&self.config).with_adapter(adapter);
        match body {
            DecodedBody::Single(params) => Ok(coordinator
                .execute_operation(params)?
                .then(ExecutionOutcome::Single)),
            DecodedBody::Batch(operations) => match coordinator.execute_batch(operations) {
                Ok(results) => Ok(results.then(ExecutionOutcome::Batch)),
                Err(error) => Ok(coordinator.fold_error(error)?.then(ExecutionOutcome::Single)),
            },
        }
    }

    /// Decodes and executes a request.
    ///
    /// Decoding failures become a single error result.
    pub fn execute_http_request(
        &self,
        request: &HttpRequest,
    ) -> Result<Promise<ExecutionOutcome>, InvariantViolation> {
        self.execute_http_request_with(request, self.config.promise_adapter)
    }

    fn execute_http_request_with(
        &self,
        request: &HttpRequest,
        adapter: PromiseAdapter,
    ) -> Result<Promise<ExecutionOutcome>, InvariantViolation> {
        match self.decoder.decode_request(request) {
            Ok(body) => {
                debug!(batch = body.is_batch(), operations = body.len(), "Decoded request");
                self.execute_request_with(body, adapter)
            }
            Err(error) => {
                debug!(error = %error, "Could not decode request");
                let result = Promise::fulfilled(ExecutionResult::from_error(error));
                Ok(apply_error_handling(result, &self.config).then(ExecutionOutcome::Single))
            }
        }
    }

    /// Handles a request end to end.
    ///
    /// Never fails: configuration defects are answered with a 500. Under
    /// [`PromiseAdapter::Sync`] pending engine work is driven on the calling
    /// thread; use [`handle_async`](Self::handle_async) from inside an async
    /// runtime.
    pub fn handle(&self, request: &HttpRequest) -> Promise<Response<Full<Bytes>>> {
        self.handle_with(request, self.config.promise_adapter)
    }

    /// Handles a request end to end on the caller's executor.
    ///
    /// The configured adapter is ignored: pending engine work is always
    /// awaited, never blocked on.
    pub async fn handle_async(&self, request: &HttpRequest) -> Response<Full<Bytes>> {
        self.handle_with(request, PromiseAdapter::Async).await
    }

    fn handle_with(
        &self,
        request: &HttpRequest,
        adapter: PromiseAdapter,
    ) -> Promise<Response<Full<Bytes>>> {
        let span = info_span!("graphql_request", method = %request.method, ?adapter);
        let _entered = span.enter();

        let outcome = match self.execute_http_request_with(request, adapter) {
            Ok(outcome) => self.notify_resolved(outcome),
            Err(violation) => return Promise::fulfilled(self.fatal_response(&violation)),
        };

        let encoder = self.encoder.clone();
        let debug = self.config.debug;
        encoder
            .to_response(outcome)
            .then(move |response| match response {
                Ok(response) => response,
                Err(violation) => encoder.fatal_response(&violation, debug),
            })
    }

    /// Handles a request and writes the response CGI-style.
    pub fn handle_and_send<W>(
        &self,
        request: &HttpRequest,
        mut writer: W,
        exit_when_done: bool,
    ) -> Promise<io::Result<()>>
    where
        W: Write + Send + 'static,
    {
        match self.execute_http_request(request) {
            Ok(outcome) => {
                let outcome = self.notify_resolved(outcome);
                self.encoder.send(outcome, writer, exit_when_done)
            }
            Err(violation) => Promise::fulfilled(self.encoder.send_fatal(
                &violation,
                self.config.debug,
                &mut writer,
                exit_when_done,
            )),
        }
    }

    /// Builds the 500 response for an error that aborted the request.
    pub fn fatal_response(
        &self,
        error: &(dyn std::error::Error + 'static),
    ) -> Response<Full<Bytes>> {
        self.encoder.fatal_response(error, self.config.debug)
    }

    fn notify_resolved(&self, outcome: Promise<ExecutionOutcome>) -> Promise<ExecutionOutcome> {
        let Some(listener) = self.config.listener.clone() else {
            return outcome;
        };
        outcome.then(move |outcome| {
            notify(listener.as_ref(), &outcome);
            outcome
        })
    }
}

fn notify(listener: &dyn ExecutionListener, outcome: &ExecutionOutcome) {
    listener.request_resolved(&RequestResolved { outcome });
}

impl<E: ExecutionEngine> From<ServerConfig<E>> for StandardServer<E> {
    fn from(config: ServerConfig<E>) -> Self {
        Self::new(config)
    }
}
