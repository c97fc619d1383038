//! Correlation identifier propagation.
//!
//! Every inbound request gets exactly one correlation id: reused from the
//! `x-correlation-id` request header when present and non-blank, synthesized
//! otherwise. The id is echoed on the response under the same name, attached
//! to every downstream call, and stamped on every log record emitted while
//! the request is in flight. It is carried explicitly in a [`RequestContext`]
//! argument through every call boundary rather than in ambient task-local
//! state, so propagation is visible in the signatures.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use uuid::Uuid;

/// Request and response header carrying the correlation id. Header names are
/// case-insensitive; this is the canonical lowercase spelling.
pub const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

/// Opaque token linking all calls and log records of one inbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Synthesizes a fresh unique id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reads the id from inbound headers. Returns None when the header is
    /// missing, blank, or not valid visible ASCII.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(&CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.trim().is_empty())
            .map(|s| Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sets the correlation header, echoing the id byte-identical.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            headers.insert(&CORRELATION_HEADER, value);
        }
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-request context passed as an argument through the resolver, the
/// downstream client, the aggregator, and the router. Scope is exactly one
/// inbound request; concurrent requests never share one.
#[derive(Clone, Debug)]
pub struct RequestContext {
    correlation_id: CorrelationId,
}

impl RequestContext {
    /// Establishes the context at request ingress: reuse the inbound id when
    /// present, synthesize otherwise.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let correlation_id =
            CorrelationId::from_headers(headers).unwrap_or_else(CorrelationId::generate);
        Self { correlation_id }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_id_is_reused() {
        let mut headers = HeaderMap::new();
        headers.insert(&CORRELATION_HEADER, HeaderValue::from_static("abc-123"));

        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.correlation_id().as_str(), "abc-123");
    }

    #[test]
    fn test_missing_header_synthesizes() {
        let headers = HeaderMap::new();
        let ctx = RequestContext::from_headers(&headers);
        assert!(!ctx.correlation_id().as_str().is_empty());
    }

    #[test]
    fn test_blank_header_synthesizes() {
        let mut headers = HeaderMap::new();
        headers.insert(&CORRELATION_HEADER, HeaderValue::from_static("   "));

        let ctx = RequestContext::from_headers(&headers);
        assert_ne!(ctx.correlation_id().as_str(), "   ");
        assert!(!ctx.correlation_id().as_str().trim().is_empty());
    }

    #[test]
    fn test_concurrent_requests_get_distinct_ids() {
        let a = RequestContext::from_headers(&HeaderMap::new());
        let b = RequestContext::from_headers(&HeaderMap::new());
        assert_ne!(a.correlation_id(), b.correlation_id());
    }

    #[test]
    fn test_apply_echoes_byte_identical() {
        let mut inbound = HeaderMap::new();
        inbound.insert(&CORRELATION_HEADER, HeaderValue::from_static("Crafted-ID-42"));
        let ctx = RequestContext::from_headers(&inbound);

        let mut outbound = HeaderMap::new();
        ctx.correlation_id().apply(&mut outbound);
        assert_eq!(
            outbound.get(&CORRELATION_HEADER).unwrap().as_bytes(),
            b"Crafted-ID-42"
        );
    }
}
