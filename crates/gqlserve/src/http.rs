//! Built-in HTTP transport.
//!
//! Serves a [`StandardServer`] over HTTP/1.1:
//! - `GET|POST {endpoint}` - GraphQL requests
//! - `OPTIONS {endpoint}` - CORS preflight
//! - `GET /health` - Health check

use bytes::Bytes;
use gqlserve_core::ExecutionEngine;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::request::HttpRequest;
use crate::server::StandardServer;

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Path GraphQL requests are served on.
    pub endpoint: String,
    /// Send permissive CORS headers.
    pub cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            endpoint: "/graphql".to_string(),
            cors: true,
        }
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the GraphQL endpoint path.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Enables or disables CORS headers.
    pub fn cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }
}

/// Errors that stop the transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid address: {0}")]
    Address(#[from] std::net::AddrParseError),
    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

fn full<T: Into<Bytes>>(chunk: T) -> BoxBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

fn boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

fn json_response(status: StatusCode, body: &'static str) -> Response<BoxBody> {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub(crate) fn health_response() -> &'static str {
    r#"{"status":"healthy"}"#
}

fn preflight_response() -> Response<BoxBody> {
    let mut response = Response::new(full(""));
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

pub(crate) async fn handle_graphql_request<E: ExecutionEngine>(
    server: &StandardServer<E>,
    request: Request<Incoming>,
    cors: bool,
) -> Response<BoxBody> {
    let (parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return json_response(
                StatusCode::BAD_REQUEST,
                r#"{"errors":[{"message":"Could not read request body"}]}"#,
            );
        }
    };

    let request = HttpRequest::from_http(&parts.method, &parts.uri, &parts.headers, body);
    debug!(method = %request.method, len = request.body.len(), "Handling GraphQL request");

    let mut response = boxed(server.handle_async(&request).await);
    if cors {
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    }
    response
}

/// Routes one request.
pub(crate) async fn route<E: ExecutionEngine>(
    server: &StandardServer<E>,
    config: &HttpConfig,
    request: Request<Incoming>,
) -> Response<BoxBody> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let on_endpoint = path == config.endpoint;

    match (method, path.as_str()) {
        (Method::GET, "/health") => json_response(StatusCode::OK, health_response()),
        (Method::OPTIONS, _) if on_endpoint => preflight_response(),
        (Method::GET | Method::POST, _) if on_endpoint => {
            handle_graphql_request(server, request, config.cors).await
        }
        _ => json_response(StatusCode::NOT_FOUND, r#"{"error":"Not Found"}"#),
    }
}

/// Serves `server` until accepting a connection fails.
///
/// Each connection is handled on its own task. Engine work is awaited on
/// the runtime whatever [`PromiseAdapter`](gqlserve_core::PromiseAdapter)
/// the config names, so engines may rely on tokio timers and IO.
pub async fn serve<E: ExecutionEngine>(
    server: Arc<StandardServer<E>>,
    config: HttpConfig,
) -> Result<(), TransportError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(TransportError::Bind)?;

    info!("Listening on http://{}{}", addr, config.endpoint);
    serve_listener(server, config, listener).await
}

/// Serves `server` on an already bound listener.
pub async fn serve_listener<E: ExecutionEngine>(
    server: Arc<StandardServer<E>>,
    config: HttpConfig,
    listener: TcpListener,
) -> Result<(), TransportError> {
    let config = Arc::new(config);
    loop {
        let (stream, peer) = listener.accept().await.map_err(TransportError::Accept)?;
        debug!(%peer, "Accepted connection");

        let server = Arc::clone(&server);
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |request: Request<Incoming>| {
                let server = Arc::clone(&server);
                let config = Arc::clone(&config);
                async move { Ok::<_, Infallible>(route(&server, &config, request).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                if !err.is_incomplete_message() {
                    error!("Connection error: {:?}", err);
                }
            }
        });
    }
}
