use crate::aggregate::Aggregator;
use crate::errors::AggregatorError;
use crate::metrics_defs;
use crate::response::into_http_response;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::correlation::RequestContext;
use shared::http::make_error_response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::Instrument;

/// Inbound HTTP surface of the aggregation service.
///
/// `/aggregate` and `/api/aggregator/aggregate` are equivalent spellings of
/// the same operation, kept for backward compatibility; same for the two
/// health paths. The health endpoints answer liveness only, with no
/// dependency checks.
pub struct AggregatorService {
    aggregator: Arc<Aggregator>,
}

impl AggregatorService {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }
}

impl Service<Request<Incoming>> for AggregatorService {
    type Response = Response<BoxBody<Bytes, AggregatorError>>;
    type Error = AggregatorError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let aggregator = self.aggregator.clone();

        Box::pin(async move {
            let started = Instant::now();
            let ctx = RequestContext::from_headers(req.headers());

            let mut response = match (req.method(), req.uri().path()) {
                (&Method::GET, "/aggregate" | "/api/aggregator/aggregate") => {
                    let span = tracing::info_span!(
                        "aggregate",
                        correlation_id = %ctx.correlation_id()
                    );
                    let outcome = aggregator.aggregate(&ctx).instrument(span).await;
                    into_http_response(outcome, &ctx)
                }
                (&Method::GET, "/health" | "/api/aggregator/health") => Response::new(
                    Full::new(Bytes::from("ok\n"))
                        .map_err(|e| match e {})
                        .boxed(),
                ),
                _ => {
                    tracing::debug!(
                        correlation_id = %ctx.correlation_id(),
                        method = %req.method(),
                        path = %req.uri().path(),
                        "no aggregator route matched"
                    );
                    make_error_response(StatusCode::NOT_FOUND)
                }
            };

            // Echo the correlation id on every response, errors included.
            ctx.correlation_id().apply(response.headers_mut());

            metrics_defs::REQUEST_DURATION.record(started.elapsed().as_secs_f64());
            metrics::counter!(
                metrics_defs::REQUESTS.name,
                "status" => response.status().as_str().to_owned()
            )
            .increment(1);
            tracing::info!(
                correlation_id = %ctx.correlation_id(),
                method = %req.method(),
                path = %req.uri().path(),
                status = %response.status(),
                "handled request"
            );

            Ok(response)
        })
    }
}
