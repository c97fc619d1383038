use crate::config::Config;
use crate::errors::ProxyError;
use crate::forward::forward;
use crate::metrics_defs;
use crate::rules::{RouteTable, rewrite_path};
use bytes::Bytes;
use http::header::HOST;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use resolver::Resolve;
use shared::correlation::RequestContext;
use shared::http::{make_error_response, problem_response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// The reverse proxy: matches each inbound request against the route table,
/// resolves the target service, and forwards 1:1. No aggregation, no
/// retries.
pub struct ProxyService {
    table: RouteTable,
    resolver: Arc<dyn Resolve>,
    client: Client<HttpConnector, Incoming>,
    forward_timeout: Duration,
}

impl ProxyService {
    pub fn new(config: &Config, resolver: Arc<dyn Resolve>) -> Self {
        let client: Client<_, Incoming> = Client::builder(TokioExecutor::new())
            .http2_adaptive_window(true)
            .build(HttpConnector::new());

        Self {
            table: RouteTable::new(config.routes.clone()),
            resolver,
            client,
            forward_timeout: Duration::from_secs(config.downstream_timeout_secs),
        }
    }
}

impl Service<Request<Incoming>> for ProxyService {
    type Response = Response<BoxBody<Bytes, ProxyError>>;
    type Error = ProxyError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let table = self.table.clone();
        let resolver = self.resolver.clone();
        let client = self.client.clone();
        let forward_timeout = self.forward_timeout;

        Box::pin(async move {
            let started = Instant::now();
            let ctx = RequestContext::from_headers(req.headers());

            let host = req
                .headers()
                .get(HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_owned);
            let method = req.method().clone();
            let path = req.uri().path().to_owned();
            let query = req.uri().query().map(str::to_owned);

            let mut response = match table.find(host.as_deref(), &path) {
                None => {
                    tracing::warn!(
                        correlation_id = %ctx.correlation_id(),
                        method = %method,
                        path = %path,
                        "no route matched"
                    );
                    problem_response(StatusCode::NOT_FOUND, "No route matched", None)
                }
                Some(route) => match resolver.resolve(&route.target, &ctx).await {
                    Err(err) => {
                        tracing::warn!(
                            correlation_id = %ctx.correlation_id(),
                            target = %route.target,
                            error = %err,
                            "backend resolution failed"
                        );
                        metrics_defs::RESOLUTION_FAILURES.incr(1);
                        problem_response(
                            StatusCode::SERVICE_UNAVAILABLE,
                            "Downstream service unavailable",
                            Some("ResolutionFailure"),
                        )
                    }
                    Ok(endpoint) => {
                        let rewritten = rewrite_path(route, &path);
                        let path_and_query = match &query {
                            Some(q) => format!("{rewritten}?{q}"),
                            None => rewritten,
                        };

                        match forward(
                            &client,
                            &endpoint.url,
                            &path_and_query,
                            req,
                            &ctx,
                            forward_timeout,
                        )
                        .await
                        {
                            Ok(response) => response,
                            Err(ProxyError::UpstreamTimeout(upstream)) => {
                                tracing::warn!(
                                    correlation_id = %ctx.correlation_id(),
                                    upstream = %upstream,
                                    "upstream timed out"
                                );
                                metrics_defs::UPSTREAM_FAILURES.incr(1);
                                make_error_response(StatusCode::GATEWAY_TIMEOUT)
                            }
                            Err(err) => {
                                tracing::warn!(
                                    correlation_id = %ctx.correlation_id(),
                                    target = %route.target,
                                    error = %err,
                                    "upstream request failed"
                                );
                                metrics_defs::UPSTREAM_FAILURES.incr(1);
                                make_error_response(StatusCode::BAD_GATEWAY)
                            }
                        }
                    }
                },
            };

            // Correlation response header is the one addition to an
            // otherwise unmodified response.
            ctx.correlation_id().apply(response.headers_mut());

            metrics_defs::REQUEST_DURATION.record(started.elapsed().as_secs_f64());
            metrics::counter!(
                metrics_defs::REQUESTS.name,
                "status" => response.status().as_str().to_owned()
            )
            .increment(1);
            tracing::info!(
                correlation_id = %ctx.correlation_id(),
                method = %method,
                path = %path,
                status = %response.status(),
                "proxied request"
            );

            Ok(response)
        })
    }
}
