//! HTTP request decoding.
//!
//! Turns an HTTP request into one [`OperationParams`] or a batch of them.
//! Supported inputs:
//! - `GET` with URL query parameters (read-only)
//! - `POST` with `application/json` (object or batch array)
//! - `POST` with `application/graphql` (raw query text)
//! - `POST` with `application/x-www-form-urlencoded` or `multipart/form-data`

use bytes::Bytes;
use gqlserve_core::{OperationParams, RequestError, DEFAULT_VARIABLES_FIELD};
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, Method, Uri};
use indexmap::IndexMap;
use memchr::memmem;
use serde_json::{Map, Value};
use tracing::debug;

/// A transport-neutral HTTP request.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: Method,
    pub content_type: Option<String>,
    pub query_params: IndexMap<String, String>,
    pub body: Bytes,
}

impl HttpRequest {
    /// Creates a `GET` request from a URL query string.
    pub fn get(query_string: &str) -> Self {
        Self::default().with_query_string(query_string)
    }

    /// Creates a `POST` request.
    pub fn post(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            content_type: Some(content_type.into()),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Creates a request with an arbitrary method and no body.
    pub fn with_method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Builds a request from hyper's request head.
    pub fn from_http(method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes) -> Self {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self {
            method: method.clone(),
            content_type,
            query_params: IndexMap::new(),
            body,
        }
        .with_query_string(uri.query().unwrap_or_default())
    }

    /// Adds URL query parameters, later keys replacing earlier ones.
    pub fn with_query_string(mut self, query_string: &str) -> Self {
        let query_string = query_string.strip_prefix('?').unwrap_or(query_string);
        for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
            self.query_params.insert(key.into_owned(), value.into_owned());
        }
        self
    }
}

/// Operation parameters decoded from a request.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Single(OperationParams),
    Batch(Vec<OperationParams>),
}

impl DecodedBody {
    /// Returns true for batched requests.
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }

    /// Number of operations in the request.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(ops) => ops.len(),
        }
    }

    /// Returns true for a batch with no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decodes HTTP requests into operation parameters.
#[derive(Debug, Clone)]
pub struct RequestDecoder {
    variables_field: String,
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestDecoder {
    /// Creates a decoder reading variables from `variables`.
    pub fn new() -> Self {
        Self {
            variables_field: DEFAULT_VARIABLES_FIELD.to_string(),
        }
    }

    /// Reads variables from a differently named field.
    pub fn variables_field(mut self, name: impl Into<String>) -> Self {
        self.variables_field = name.into();
        self
    }

    /// Decodes a request.
    pub fn decode_request(&self, request: &HttpRequest) -> Result<DecodedBody, RequestError> {
        self.decode(
            &request.method,
            request.content_type.as_deref(),
            &request.body,
            &request.query_params,
        )
    }

    /// Decodes a request from its parts.
    ///
    /// Only `GET` and `POST` are accepted. Malformed input is reported as a
    /// [`RequestError`] so it can be answered in-band.
    pub fn decode(
        &self,
        method: &Method,
        content_type: Option<&str>,
        body: &[u8],
        query_params: &IndexMap<String, String>,
    ) -> Result<DecodedBody, RequestError> {
        if *method == Method::GET {
            let input = query_params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            return Ok(DecodedBody::Single(self.params(input, true)));
        }

        if *method != Method::POST {
            return Err(RequestError::new(format!(
                "HTTP Method \"{method}\" is not supported"
            )));
        }

        let content_type =
            content_type.ok_or_else(|| RequestError::new("Missing Content-Type header"))?;
        let media_type = content_type.to_ascii_lowercase();
        debug!(content_type, len = body.len(), "Decoding POST body");

        if media_type.contains("application/graphql") {
            let query = std::str::from_utf8(body)
                .map_err(|e| RequestError::new(format!("Request body is not valid UTF-8: {e}")))?;
            let mut input = Map::new();
            input.insert("query".to_string(), Value::String(query.to_string()));
            Ok(DecodedBody::Single(self.params(input, false)))
        } else if media_type.contains("application/json") {
            self.decode_json(body)
        } else if media_type.contains("application/x-www-form-urlencoded") {
            let input = url::form_urlencoded::parse(body)
                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                .collect();
            Ok(DecodedBody::Single(self.params(input, false)))
        } else if media_type.contains("multipart/form-data") {
            let input = parse_multipart(content_type, body)?;
            Ok(DecodedBody::Single(self.params(input, false)))
        } else {
            Err(RequestError::new(format!(
                "Unexpected content type: \"{content_type}\""
            )))
        }
    }

    fn decode_json(&self, body: &[u8]) -> Result<DecodedBody, RequestError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| RequestError::new(format!("Could not parse JSON: {e}")))?;

        match value {
            Value::Object(input) => Ok(DecodedBody::Single(self.params(input, false))),
            Value::Array(entries) if entries.is_empty() => {
                Ok(DecodedBody::Single(OperationParams::new()))
            }
            Value::Array(entries) => Ok(DecodedBody::Batch(
                entries
                    .into_iter()
                    .map(|entry| match entry {
                        Value::Object(input) => self.params(input, false),
                        _ => OperationParams::new(),
                    })
                    .collect(),
            )),
            other => Err(RequestError::new(format!(
                "GraphQL Server expects JSON object or array, but got {other}"
            ))),
        }
    }

    fn params(&self, input: Map<String, Value>, read_only: bool) -> OperationParams {
        OperationParams::from_map(input, read_only, &self.variables_field)
    }
}

/// Reads the text fields of a `multipart/form-data` body. File parts are
/// skipped.
fn parse_multipart(content_type: &str, body: &[u8]) -> Result<Map<String, Value>, RequestError> {
    let boundary = header_param(content_type, "boundary")
        .filter(|b| !b.is_empty())
        .ok_or_else(|| RequestError::new("Missing boundary in multipart \"Content-Type\" header"))?;
    // A delimiter only counts at the start of the body or right after CRLF.
    let delimiter = format!("\r\n--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut delimiters: Vec<(usize, usize)> = Vec::new();
    if body.starts_with(&delimiter[2..]) {
        delimiters.push((0, delimiter.len() - 2));
    }
    delimiters.extend(memmem::find_iter(body, delimiter).map(|at| (at, at + delimiter.len())));

    let mut input = Map::new();
    for window in delimiters.windows(2) {
        let part = &body[window[0].1..window[1].0];
        let part = part.strip_prefix(b"\r\n").unwrap_or(part);

        let Some(split) = memmem::find(part, b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&part[..split]);
        let Some(disposition) = headers.lines().find(|line| {
            line.to_ascii_lowercase()
                .starts_with("content-disposition:")
        }) else {
            continue;
        };
        if header_param(disposition, "filename").is_some() {
            continue;
        }
        let Some(name) = header_param(disposition, "name") else {
            continue;
        };

        let content = std::str::from_utf8(&part[split + 4..]).map_err(|e| {
            RequestError::new(format!("Multipart field \"{name}\" is not valid UTF-8: {e}"))
        })?;
        input.insert(name, Value::String(content.to_string()));
    }
    Ok(input)
}

/// Extracts `name=value` from a `;`-separated header value.
fn header_param(header: &str, name: &str) -> Option<String> {
    header.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().trim_matches('"').to_string())
    })
}
