//! Response encoding.
//!
//! Maps execution outcomes to a status code and a JSON body, then emits
//! them either as an [`http::Response`](hyper::Response) or as CGI-style
//! text on a writer. The fatal path answers 500 with
//! `{"errors":[...]}` and no `data` key.

use bytes::Bytes;
use gqlserve_core::{format_fatal, DebugFlags, ExecutionResult, InvariantViolation, OperationError, Promise};
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::ser::{Serialize, Serializer};
use serde_json::Value;
use std::io::{self, Write};
use tracing::{debug, error};

const APPLICATION_JSON: &str = "application/json";
const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// What a request produced: one result, or one per batch entry.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Single(ExecutionResult),
    Batch(Vec<ExecutionResult>),
}

impl ExecutionOutcome {
    /// Errors across every result, in order.
    pub fn errors(&self) -> impl Iterator<Item = &OperationError> {
        let results: &[ExecutionResult] = match self {
            Self::Single(result) => std::slice::from_ref(result),
            Self::Batch(results) => results,
        };
        results.iter().flat_map(|r| r.errors.iter())
    }

    /// Converts the outcome to its response JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Single(result) => result.to_json(),
            Self::Batch(results) => Value::Array(results.iter().map(ExecutionResult::to_json).collect()),
        }
    }
}

impl From<ExecutionResult> for ExecutionOutcome {
    fn from(result: ExecutionResult) -> Self {
        Self::Single(result)
    }
}

impl From<Vec<ExecutionResult>> for ExecutionOutcome {
    fn from(results: Vec<ExecutionResult>) -> Self {
        Self::Batch(results)
    }
}

impl Serialize for ExecutionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Single(result) => result.serialize(serializer),
            Self::Batch(results) => results.serialize(serializer),
        }
    }
}

/// Turns outcomes into HTTP responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseEncoder {
    headers: Vec<(String, String)>,
    pretty: bool,
    detect_unauthorized: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header to every response.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Pretty-prints JSON bodies.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Answers 403 for single results carrying an `Unauthorized` error.
    pub fn detect_unauthorized(mut self, enabled: bool) -> Self {
        self.detect_unauthorized = enabled;
        self
    }

    /// Chooses the status code for an outcome.
    ///
    /// Batches are always 200. A single result is 400 when it has errors
    /// and no data.
    pub fn status_for(&self, outcome: &ExecutionOutcome) -> StatusCode {
        match outcome {
            ExecutionOutcome::Batch(_) => StatusCode::OK,
            ExecutionOutcome::Single(result) => {
                if self.detect_unauthorized
                    && result.errors.iter().any(|e| e.message == UNAUTHORIZED_MESSAGE)
                {
                    StatusCode::FORBIDDEN
                } else if result.is_fatal() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::OK
                }
            }
        }
    }

    /// Serializes a body.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, InvariantViolation> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        encoded.map_err(|e| InvariantViolation::new(format!("Could not encode response body: {e}")))
    }

    /// Builds the response once the outcome is available.
    pub fn to_response(
        &self,
        outcome: Promise<ExecutionOutcome>,
    ) -> Promise<Result<Response<Full<Bytes>>, InvariantViolation>> {
        let encoder = self.clone();
        outcome.then(move |outcome| encoder.build_response(&outcome))
    }

    /// Builds the response for an available outcome.
    pub fn build_response(
        &self,
        outcome: &ExecutionOutcome,
    ) -> Result<Response<Full<Bytes>>, InvariantViolation> {
        let status = self.status_for(outcome);
        let body = self.encode(outcome)?;
        debug!(status = status.as_u16(), len = body.len(), "Encoded response");

        let mut response = json_response(status, body);
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| InvariantViolation::new(format!("Invalid header name \"{name}\": {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| InvariantViolation::new(format!("Invalid value for header \"{name}\": {e}")))?;
            response.headers_mut().append(name, value);
        }
        Ok(response)
    }

    /// Writes the outcome CGI-style once it is available.
    ///
    /// With `exit_when_done` the process exits after a successful write.
    pub fn send<W>(
        &self,
        outcome: Promise<ExecutionOutcome>,
        mut writer: W,
        exit_when_done: bool,
    ) -> Promise<io::Result<()>>
    where
        W: Write + Send + 'static,
    {
        let encoder = self.clone();
        outcome.then(move |outcome| {
            encoder.write_outcome(&outcome, &mut writer)?;
            if exit_when_done {
                std::process::exit(0);
            }
            Ok(())
        })
    }

    /// Writes an available outcome CGI-style.
    pub fn write_outcome<W: Write>(&self, outcome: &ExecutionOutcome, writer: &mut W) -> io::Result<()> {
        match self.encode(outcome) {
            Ok(body) => self.write_raw(self.status_for(outcome), &self.headers, &body, writer),
            Err(violation) => self.write_fatal(&violation, DebugFlags::NONE, writer),
        }
    }

    /// Body of a fatal response.
    pub fn fatal_body(error: &(dyn std::error::Error + 'static), debug: DebugFlags) -> Value {
        serde_json::json!({ "errors": [Value::Object(format_fatal(error, debug))] })
    }

    /// Builds the 500 response for an error that aborted the request.
    pub fn fatal_response(
        &self,
        error: &(dyn std::error::Error + 'static),
        debug: DebugFlags,
    ) -> Response<Full<Bytes>> {
        error!(error = %error, "Request aborted");
        json_response(StatusCode::INTERNAL_SERVER_ERROR, self.fatal_bytes(error, debug))
    }

    /// Writes the 500 response for an error that aborted the request.
    pub fn send_fatal<W: Write>(
        &self,
        error: &(dyn std::error::Error + 'static),
        debug: DebugFlags,
        writer: &mut W,
        exit_when_done: bool,
    ) -> io::Result<()> {
        error!(error = %error, "Request aborted");
        self.write_fatal(error, debug, writer)?;
        if exit_when_done {
            std::process::exit(0);
        }
        Ok(())
    }

    fn write_fatal<W: Write>(
        &self,
        error: &(dyn std::error::Error + 'static),
        debug: DebugFlags,
        writer: &mut W,
    ) -> io::Result<()> {
        let body = self.fatal_bytes(error, debug);
        self.write_raw(StatusCode::INTERNAL_SERVER_ERROR, &[], &body, writer)
    }

    fn fatal_bytes(&self, error: &(dyn std::error::Error + 'static), debug: DebugFlags) -> Vec<u8> {
        let body = Self::fatal_body(error, debug);
        self.encode(&body).unwrap_or_else(|_| body.to_string().into_bytes())
    }

    fn write_raw<W: Write>(
        &self,
        status: StatusCode,
        headers: &[(String, String)],
        body: &[u8],
        writer: &mut W,
    ) -> io::Result<()> {
        write!(
            writer,
            "Status: {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        )?;
        write!(writer, "Content-Type: {APPLICATION_JSON}\r\n")?;
        for (name, value) in headers {
            write!(writer, "{name}: {value}\r\n")?;
        }
        writer.write_all(b"\r\n")?;
        writer.write_all(body)?;
        writer.flush()
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_status_codes() {
        let encoder = ResponseEncoder::new();
        let ok = ExecutionOutcome::Single(ExecutionResult::new(json!({"a": 1})));
        let partial = ExecutionOutcome::Single(
            ExecutionResult::new(json!({"a": null})).with_errors([OperationError::new("x")]),
        );
        let failed = ExecutionOutcome::Single(ExecutionResult::from_error(OperationError::new("x")));
        let batch = ExecutionOutcome::Batch(vec![ExecutionResult::from_error(OperationError::new("x"))]);

        assert_eq!(encoder.status_for(&ok), StatusCode::OK);
        assert_eq!(encoder.status_for(&partial), StatusCode::OK);
        assert_eq!(encoder.status_for(&failed), StatusCode::BAD_REQUEST);
        assert_eq!(encoder.status_for(&batch), StatusCode::OK);
    }

    #[test]
    fn test_unauthorized_is_opt_in() {
        let outcome = ExecutionOutcome::Single(
            ExecutionResult::new(json!({"me": null})).with_errors([OperationError::new("Unauthorized")]),
        );
        assert_eq!(ResponseEncoder::new().status_for(&outcome), StatusCode::OK);
        assert_eq!(
            ResponseEncoder::new().detect_unauthorized(true).status_for(&outcome),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_to_response() {
        let encoder = ResponseEncoder::new().header("X-Served-By", "gqlserve");
        let outcome = Promise::fulfilled(ExecutionOutcome::Single(ExecutionResult::new(
            json!({"hello": "world"}),
        )));
        let response = encoder.to_response(outcome).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], APPLICATION_JSON);
        assert_eq!(response.headers()["x-served-by"], "gqlserve");
        insta::assert_snapshot!(body_string(response).await, @r#"{"data":{"hello":"world"}}"#);
    }

    #[test]
    fn test_invalid_header_is_invariant() {
        let encoder = ResponseEncoder::new().header("bad header", "x");
        let outcome = ExecutionOutcome::Single(ExecutionResult::new(json!({})));
        assert!(encoder.build_response(&outcome).is_err());
    }

    #[test]
    fn test_batch_body_keeps_order() {
        let outcome = ExecutionOutcome::Batch(vec![
            ExecutionResult::new(json!({"a": 1})),
            ExecutionResult::from_error(OperationError::new("b failed")),
        ]);
        let body = ResponseEncoder::new().encode(&outcome).unwrap();
        insta::assert_snapshot!(
            String::from_utf8(body).unwrap(),
            @r#"[{"data":{"a":1}},{"data":null,"errors":[{"message":"b failed"}]}]"#
        );
    }

    #[test]
    fn test_send_writes_cgi_style() {
        let encoder = ResponseEncoder::new().header("Cache-Control", "no-store");
        let outcome = ExecutionOutcome::Single(ExecutionResult::from_error(OperationError::new("nope")));
        let mut out = Vec::new();
        encoder.write_outcome(&outcome, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Status: 400 Bad Request\r\n\
             Content-Type: application/json\r\n\
             Cache-Control: no-store\r\n\
             \r\n\
             {\"data\":null,\"errors\":[{\"message\":\"nope\"}]}"
        );
    }

    #[test]
    fn test_send_resolves_pending_outcome() {
        let outcome = Promise::from_future(async {
            ExecutionOutcome::Single(ExecutionResult::new(json!({"late": true})))
        });
        let sent = ResponseEncoder::new().send(outcome, io::sink(), false);
        assert!(sent.is_pending());
        futures::executor::block_on(async move { sent.await }).unwrap();
    }

    #[tokio::test]
    async fn test_fatal_response_has_no_data() {
        let violation = InvariantViolation::new("Schema is required for the server");
        let response = ResponseEncoder::new().fatal_response(&violation, DebugFlags::NONE);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        insta::assert_snapshot!(
            body_string(response).await,
            @r#"{"errors":[{"message":"Internal server error"}]}"#
        );
    }

    #[test]
    fn test_fatal_body_with_debug() {
        let violation = InvariantViolation::new("Schema is required for the server");
        let body = ResponseEncoder::fatal_body(&violation, DebugFlags::INCLUDE_DEBUG_MESSAGE);
        assert_eq!(
            body,
            json!({"errors": [{
                "message": "Internal server error",
                "debugMessage": "Schema is required for the server",
                "category": "internal"
            }]})
        );
    }
}
