use crate::errors::ProxyError;
use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response};
use hyper_util::client::legacy::Client;
use shared::correlation::RequestContext;
use shared::headers::{add_via_header, filter_hop_by_hop};
use std::time::Duration;
use tokio::time::timeout;

/// Forwards one request to a single upstream, 1:1 and without retries.
///
/// This function handles the forwarding cycle:
/// - Building the full URI from the upstream base URL and the (possibly
///   rewritten) path and query
/// - Filtering hop-by-hop headers in both directions
/// - Adding Via headers and the correlation id header
///
/// The request is otherwise forwarded verbatim (method, headers, body), and
/// the response body is streamed back, not buffered. `forward_timeout`
/// bounds connect through response headers only; a streaming body is the
/// caller's to consume at its own pace.
pub async fn forward<C, B>(
    client: &Client<C, B>,
    upstream_url: &url::Url,
    path_and_query: &str,
    request: Request<B>,
    ctx: &RequestContext,
    forward_timeout: Duration,
) -> Result<Response<BoxBody<Bytes, ProxyError>>, ProxyError>
where
    C: hyper_util::client::legacy::connect::Connect + Clone + Send + Sync + 'static,
    B: hyper::body::Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    // Use host as identifier for error messages
    let upstream_identifier = upstream_url
        .host_str()
        .unwrap_or(upstream_url.as_str())
        .to_owned();

    let mut url = upstream_url.clone();
    if let Some((path, query)) = path_and_query.split_once('?') {
        url.set_path(path);
        url.set_query(Some(query));
    } else {
        url.set_path(path_and_query);
    }

    let (mut parts, body) = request.into_parts();
    let request_version = parts.version;
    filter_hop_by_hop(&mut parts.headers, request_version);
    add_via_header(&mut parts.headers, request_version);
    ctx.correlation_id().apply(&mut parts.headers);

    let mut req_builder = Request::builder()
        .method(parts.method)
        .uri(url.as_str())
        .version(parts.version);

    for (name, value) in parts.headers.iter() {
        req_builder = req_builder.header(name, value);
    }

    let upstream_request = req_builder
        .body(body)
        .map_err(|e| ProxyError::RequestBuild(e.to_string()))?;

    let response = timeout(forward_timeout, client.request(upstream_request))
        .await
        .map_err(|_| ProxyError::UpstreamTimeout(upstream_identifier.clone()))?
        .map_err(|e| ProxyError::UpstreamRequestFailed(upstream_identifier, e.to_string()))?;

    // Stream the body back unmodified; only headers are touched.
    let (mut parts, body) = response.into_parts();
    let response_version = parts.version;
    filter_hop_by_hop(&mut parts.headers, response_version);
    add_via_header(&mut parts.headers, response_version);

    Ok(Response::from_parts(
        parts,
        body.map_err(ProxyError::from).boxed(),
    ))
}
