//! Assembles the aggregate HTTP response from a classified outcome.
//!
//! Full success and degraded outcomes are both HTTP 200 -- partial data has
//! value to the caller, and a single status keeps client handling simple.
//! Systemic outage is 503 and orchestration defects are 500, both with
//! machine-readable problem bodies.

use crate::aggregate::{AggregateOutcome, TaskOutcome, TaskResult};
use crate::errors::AggregatorError;
use http::header::{CONTENT_TYPE, HeaderValue};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use shared::correlation::RequestContext;
use shared::http::problem_response;

pub fn into_http_response(
    outcome: AggregateOutcome,
    ctx: &RequestContext,
) -> Response<BoxBody<Bytes, AggregatorError>> {
    match outcome {
        AggregateOutcome::Complete(results) | AggregateOutcome::Degraded(results) => {
            json_response(results, ctx)
        }
        AggregateOutcome::Unavailable => problem_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Downstream services unavailable",
            Some("ConnectivityFailure"),
        ),
        AggregateOutcome::Internal(reason) => {
            tracing::error!(
                correlation_id = %ctx.correlation_id(),
                reason = %reason,
                "aggregation failed unexpectedly"
            );
            problem_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unexpected error",
                Some("InternalFailure"),
            )
        }
    }
}

/// Successful fields keyed by task name in declaration order, followed by an
/// explicit `failures` marker per failed task.
fn json_response(
    results: Vec<TaskResult>,
    ctx: &RequestContext,
) -> Response<BoxBody<Bytes, AggregatorError>> {
    let mut fields: IndexMap<String, JsonValue> = IndexMap::with_capacity(results.len() + 1);
    let mut failures = Vec::new();

    for result in results {
        match result.outcome {
            TaskOutcome::Success(value) => {
                fields.insert(result.name, value);
            }
            TaskOutcome::Failure(kind) => {
                failures.push(serde_json::json!({
                    "task": result.name,
                    "kind": kind.as_str(),
                }));
            }
        }
    }

    if !failures.is_empty() {
        fields.insert("failures".to_string(), JsonValue::Array(failures));
    }

    let bytes = match serde_json::to_vec(&fields) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            tracing::error!(
                correlation_id = %ctx.correlation_id(),
                error = %e,
                "failed to serialize aggregate response"
            );
            return problem_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unexpected error",
                Some("InternalFailure"),
            );
        }
    };

    let mut response = Response::new(Full::new(bytes).map_err(|e| match e {}).boxed());
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use http::HeaderMap;
    use http_body_util::BodyExt;

    fn ctx() -> RequestContext {
        RequestContext::from_headers(&HeaderMap::new())
    }

    fn success(name: &str, value: i64) -> TaskResult {
        TaskResult {
            name: name.to_string(),
            outcome: TaskOutcome::Success(serde_json::json!(value)),
        }
    }

    fn failure(name: &str, kind: FailureKind) -> TaskResult {
        TaskResult {
            name: name.to_string(),
            outcome: TaskOutcome::Failure(kind),
        }
    }

    async fn body_string(response: Response<BoxBody<Bytes, AggregatorError>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_complete_response_preserves_declaration_order() {
        let outcome = AggregateOutcome::Complete(vec![
            success("listingCount", 12),
            success("bookingCount", 3),
            success("reviewsCount", 5),
        ]);

        let response = into_http_response(outcome, &ctx());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );

        // IndexMap keeps insertion order, so the serialized text is stable
        assert_eq!(
            body_string(response).await,
            r#"{"listingCount":12,"bookingCount":3,"reviewsCount":5}"#
        );
    }

    #[tokio::test]
    async fn test_degraded_response_names_failed_task() {
        let outcome = AggregateOutcome::Degraded(vec![
            success("listingCount", 12),
            failure("bookingCount", FailureKind::Connectivity),
            success("reviewsCount", 5),
        ]);

        let response = into_http_response(outcome, &ctx());
        // Degraded is still a successful HTTP-level outcome
        assert_eq!(response.status(), StatusCode::OK);

        let parsed: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(parsed["listingCount"], 12);
        assert_eq!(parsed["reviewsCount"], 5);
        assert!(parsed.get("bookingCount").is_none());
        assert_eq!(
            parsed["failures"],
            serde_json::json!([{"task": "bookingCount", "kind": "ConnectivityFailure"}])
        );
    }

    #[tokio::test]
    async fn test_unavailable_is_503_problem() {
        let response = into_http_response(AggregateOutcome::Unavailable, &ctx());
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );

        let parsed: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(parsed["title"], "Downstream services unavailable");
        assert_eq!(parsed["status"], 503);
    }

    #[tokio::test]
    async fn test_internal_is_500_problem() {
        let response =
            into_http_response(AggregateOutcome::Internal("boom".to_string()), &ctx());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let parsed: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(parsed["title"], "Unexpected error");
        assert_eq!(parsed["reason"], "InternalFailure");
    }

    #[tokio::test]
    async fn test_all_failed_degraded_keeps_every_marker() {
        let outcome = AggregateOutcome::Degraded(vec![
            failure("listingCount", FailureKind::Contract),
            failure("bookingCount", FailureKind::Connectivity),
        ]);

        let parsed: serde_json::Value =
            serde_json::from_str(&body_string(into_http_response(outcome, &ctx())).await).unwrap();
        assert_eq!(parsed["failures"].as_array().unwrap().len(), 2);
    }
}
