//! Downstream client: one typed HTTP GET against a resolved endpoint.
//!
//! One call = one connection attempt + one bounded wait. Retries, if ever
//! wanted, are the aggregator's policy, not the client's. The correlation id
//! is attached here so no call can leave without it.

use crate::errors::FailureKind;
use http::header::ACCEPT;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use resolver::BackendEndpoint;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use shared::correlation::RequestContext;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Shape the backend's JSON body must decode into.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedShape {
    /// A bare JSON integer (the `api/metrics/<name>-count` contract).
    Integer,
    /// A JSON object.
    Object,
}

impl fmt::Display for ExpectedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedShape::Integer => f.write_str("integer"),
            ExpectedShape::Object => f.write_str("object"),
        }
    }
}

/// Failure classes of a single downstream call.
///
/// Decode is kept apart from the network failures: it means the backend
/// answered but broke its contract, which is a data problem rather than
/// unavailability.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("timeout calling {0}")]
    Timeout(String),

    #[error("connection to {0} failed: {1}")]
    Connection(String, String),

    #[error("{0} answered with status {1}")]
    Protocol(String, StatusCode),

    #[error("{0} returned a body that is not the expected {1}: {2}")]
    Decode(String, ExpectedShape, String),

    #[error("could not build request for {0}: {1}")]
    InvalidRequest(String, String),
}

impl CallError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CallError::Timeout(_) | CallError::Connection(..) => FailureKind::Connectivity,
            CallError::Protocol(..) | CallError::Decode(..) => FailureKind::Contract,
            CallError::InvalidRequest(..) => FailureKind::Internal,
        }
    }
}

#[derive(Clone)]
pub struct DownstreamClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl DownstreamClient {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }

    /// Performs `GET <endpoint>/<path>` and decodes the JSON body into the
    /// expected shape. The timeout bounds the whole cycle: connect, send,
    /// response headers, and body collection.
    pub async fn get_json(
        &self,
        endpoint: &BackendEndpoint,
        path: &str,
        shape: ExpectedShape,
        ctx: &RequestContext,
    ) -> Result<JsonValue, CallError> {
        let service = endpoint.service.as_str();

        let mut url = endpoint.url.clone();
        if let Some((p, q)) = path.split_once('?') {
            url.set_path(p);
            url.set_query(Some(q));
        } else {
            url.set_path(path);
        }

        let mut request = Request::builder()
            .method(Method::GET)
            .uri(url.as_str())
            .header(ACCEPT, "application/json")
            .body(Full::new(Bytes::new()))
            .map_err(|e| CallError::InvalidRequest(service.to_owned(), e.to_string()))?;
        ctx.correlation_id().apply(request.headers_mut());

        let call = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| CallError::Connection(service.to_owned(), e.to_string()))?;

            let (parts, body) = response.into_parts();
            if !parts.status.is_success() {
                return Err(CallError::Protocol(service.to_owned(), parts.status));
            }

            body.collect()
                .await
                .map(|collected| collected.to_bytes())
                .map_err(|e| CallError::Connection(service.to_owned(), e.to_string()))
        };

        let bytes = timeout(self.timeout, call)
            .await
            .map_err(|_| CallError::Timeout(service.to_owned()))??;

        decode(service, shape, &bytes)
    }
}

fn decode(service: &str, shape: ExpectedShape, bytes: &Bytes) -> Result<JsonValue, CallError> {
    let value: JsonValue = serde_json::from_slice(bytes)
        .map_err(|e| CallError::Decode(service.to_owned(), shape, e.to_string()))?;

    let matches = match shape {
        ExpectedShape::Integer => value.is_i64() || value.is_u64(),
        ExpectedShape::Object => value.is_object(),
    };

    if matches {
        Ok(value)
    } else {
        Err(CallError::Decode(
            service.to_owned(),
            shape,
            format!("got {}", json_type_name(&value)),
        ))
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
