//! Fan-out orchestration: one inbound request, N concurrent downstream calls.
//!
//! All task calls are issued in parallel and joined as a barrier -- the first
//! failure never cancels siblings, because a single downstream outage must
//! not mask results from healthy downstreams. Dropping the returned future
//! (caller disconnect) aborts every outstanding call: the `JoinSet` aborts
//! its tasks on drop.

use crate::client::DownstreamClient;
use crate::config::TaskConfig;
use crate::errors::FailureKind;
use crate::metrics_defs;
use resolver::Resolve;
use serde_json::Value as JsonValue;
use shared::correlation::RequestContext;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Outcome of one aggregation task. The result count always equals the task
/// count; no task is ever silently dropped.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskOutcome {
    Success(JsonValue),
    Failure(FailureKind),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaskResult {
    /// Declared task name; becomes the response field name.
    pub name: String,
    pub outcome: TaskOutcome,
}

/// Tri-state (plus defect) outcome of a whole aggregation.
#[derive(Debug, PartialEq)]
pub enum AggregateOutcome {
    /// Every task succeeded; one field per task in declaration order.
    Complete(Vec<TaskResult>),
    /// Some tasks succeeded, or a backend broke its contract. Partial data
    /// still has value to the caller.
    Degraded(Vec<TaskResult>),
    /// Every task failed with a connectivity-class kind: systemic outage.
    Unavailable,
    /// A defect in the orchestration itself, never folded into Degraded.
    Internal(String),
}

pub struct Aggregator {
    client: DownstreamClient,
    resolver: Arc<dyn Resolve>,
    tasks: Arc<[TaskConfig]>,
}

impl Aggregator {
    pub fn new(resolver: Arc<dyn Resolve>, tasks: Vec<TaskConfig>, timeout: Duration) -> Self {
        Self {
            client: DownstreamClient::new(timeout),
            resolver,
            tasks: tasks.into(),
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Runs every configured task concurrently and classifies the combined
    /// outcome. No per-task retry happens inside one call.
    pub async fn aggregate(&self, ctx: &RequestContext) -> AggregateOutcome {
        let task_count = self.tasks.len();
        let mut join_set = JoinSet::new();
        let mut slot_by_task_id = HashMap::new();

        for (slot, task) in self.tasks.iter().enumerate() {
            let client = self.client.clone();
            let resolver = self.resolver.clone();
            let task = task.clone();
            let ctx = ctx.clone();

            let handle = join_set.spawn(async move {
                let outcome = run_task(&client, resolver.as_ref(), &task, &ctx).await;
                (slot, outcome)
            });
            slot_by_task_id.insert(handle.id(), slot);
        }

        let mut outcomes: Vec<Option<TaskOutcome>> = (0..task_count).map(|_| None).collect();
        let mut defect = None;

        // Join barrier: wait for all, in completion order.
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((task_id, (slot, outcome))) => {
                    slot_by_task_id.remove(&task_id);
                    outcomes[slot] = Some(outcome);
                }
                Err(join_error) => {
                    tracing::error!(
                        correlation_id = %ctx.correlation_id(),
                        error = %join_error,
                        "aggregation task panicked"
                    );
                    if let Some(slot) = slot_by_task_id.remove(&join_error.id()) {
                        outcomes[slot] = Some(TaskOutcome::Failure(FailureKind::Internal));
                    }
                    defect = Some(join_error.to_string());
                }
            }
        }

        let results: Vec<TaskResult> = self
            .tasks
            .iter()
            .zip(outcomes)
            .map(|(task, outcome)| TaskResult {
                name: task.name.clone(),
                outcome: outcome.unwrap_or(TaskOutcome::Failure(FailureKind::Internal)),
            })
            .collect();
        debug_assert_eq!(results.len(), task_count);

        if let Some(reason) = defect {
            return AggregateOutcome::Internal(reason);
        }
        classify(results)
    }
}

/// Resolve-then-call for a single task. Resolution happens fresh here, before
/// any network attempt, so the call acts on current health information.
async fn run_task(
    client: &DownstreamClient,
    resolver: &dyn Resolve,
    task: &TaskConfig,
    ctx: &RequestContext,
) -> TaskOutcome {
    let endpoint = match resolver.resolve(&task.service, ctx).await {
        Ok(endpoint) => endpoint,
        Err(err) => {
            tracing::warn!(
                correlation_id = %ctx.correlation_id(),
                task = %task.name,
                error = %err,
                "backend resolution failed"
            );
            count_failure(FailureKind::Resolution);
            return TaskOutcome::Failure(FailureKind::Resolution);
        }
    };

    match client.get_json(&endpoint, &task.path, task.shape, ctx).await {
        Ok(value) => TaskOutcome::Success(value),
        Err(err) => {
            let kind = err.kind();
            // Contract mismatches are data-shape noise, connectivity is
            // outage; keep the log lines apart for triage.
            match kind {
                FailureKind::Contract => tracing::warn!(
                    correlation_id = %ctx.correlation_id(),
                    task = %task.name,
                    error = %err,
                    "downstream contract mismatch"
                ),
                _ => tracing::warn!(
                    correlation_id = %ctx.correlation_id(),
                    task = %task.name,
                    error = %err,
                    "downstream call failed"
                ),
            }
            count_failure(kind);
            TaskOutcome::Failure(kind)
        }
    }
}

fn count_failure(kind: FailureKind) {
    metrics::counter!(metrics_defs::TASK_FAILURES.name, "kind" => kind.as_str()).increment(1);
}

fn classify(results: Vec<TaskResult>) -> AggregateOutcome {
    let mut succeeded = 0usize;
    let mut connectivity_failures = 0usize;

    for result in &results {
        match &result.outcome {
            TaskOutcome::Success(_) => succeeded += 1,
            TaskOutcome::Failure(FailureKind::Internal) => {
                return AggregateOutcome::Internal(format!(
                    "task {} failed unexpectedly",
                    result.name
                ));
            }
            TaskOutcome::Failure(kind) if kind.is_connectivity_class() => {
                connectivity_failures += 1
            }
            TaskOutcome::Failure(_) => {}
        }
    }

    if succeeded == results.len() {
        AggregateOutcome::Complete(results)
    } else if succeeded == 0 && connectivity_failures == results.len() {
        AggregateOutcome::Unavailable
    } else {
        AggregateOutcome::Degraded(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ExpectedShape;
    use http::HeaderMap;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::TokioExecutor;
    use indexmap::IndexMap;
    use resolver::FixedResolver;
    use std::convert::Infallible;
    use tokio::net::TcpListener;
    use tokio::time::Instant;
    use url::Url;

    async fn start_backend(body: &'static str, delay: Duration) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = hyper_util::rt::TokioIo::new(stream);

                tokio::spawn(async move {
                    let service = service_fn(move |_req: Request<hyper::body::Incoming>| async move {
                        tokio::time::sleep(delay).await;
                        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        port
    }

    fn ctx() -> RequestContext {
        RequestContext::from_headers(&HeaderMap::new())
    }

    fn task(name: &str, service: &str) -> TaskConfig {
        TaskConfig {
            name: name.to_string(),
            service: service.to_string(),
            path: format!("api/metrics/{name}"),
            shape: ExpectedShape::Integer,
        }
    }

    fn aggregator(services: &[(&str, u16)], tasks: Vec<TaskConfig>, timeout: Duration) -> Aggregator {
        let services: IndexMap<String, Vec<Url>> = services
            .iter()
            .map(|(name, port)| {
                (
                    name.to_string(),
                    vec![Url::parse(&format!("http://127.0.0.1:{port}")).unwrap()],
                )
            })
            .collect();
        Aggregator::new(Arc::new(FixedResolver::new(services)), tasks, timeout)
    }

    #[tokio::test]
    async fn test_all_tasks_succeed() {
        let listing = start_backend("12", Duration::ZERO).await;
        let booking = start_backend("3", Duration::ZERO).await;
        let reviews = start_backend("5", Duration::ZERO).await;

        let aggregator = aggregator(
            &[
                ("listingService", listing),
                ("bookingService", booking),
                ("reviewsService", reviews),
            ],
            vec![
                task("listingCount", "listingService"),
                task("bookingCount", "bookingService"),
                task("reviewsCount", "reviewsService"),
            ],
            Duration::from_secs(5),
        );

        let outcome = aggregator.aggregate(&ctx()).await;
        let AggregateOutcome::Complete(results) = outcome else {
            panic!("expected complete outcome, got {outcome:?}");
        };

        // One result per task, in declaration order
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name, "listingCount");
        assert_eq!(results[0].outcome, TaskOutcome::Success(serde_json::json!(12)));
        assert_eq!(results[1].name, "bookingCount");
        assert_eq!(results[1].outcome, TaskOutcome::Success(serde_json::json!(3)));
        assert_eq!(results[2].name, "reviewsCount");
        assert_eq!(results[2].outcome, TaskOutcome::Success(serde_json::json!(5)));
    }

    #[tokio::test]
    async fn test_one_timeout_degrades() {
        let listing = start_backend("12", Duration::ZERO).await;
        let booking = start_backend("3", Duration::from_secs(5)).await; // slower than timeout
        let reviews = start_backend("5", Duration::ZERO).await;

        let aggregator = aggregator(
            &[
                ("listingService", listing),
                ("bookingService", booking),
                ("reviewsService", reviews),
            ],
            vec![
                task("listingCount", "listingService"),
                task("bookingCount", "bookingService"),
                task("reviewsCount", "reviewsService"),
            ],
            Duration::from_millis(300),
        );

        let outcome = aggregator.aggregate(&ctx()).await;
        let AggregateOutcome::Degraded(results) = outcome else {
            panic!("expected degraded outcome, got {outcome:?}");
        };

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].outcome, TaskOutcome::Success(serde_json::json!(12)));
        assert_eq!(
            results[1].outcome,
            TaskOutcome::Failure(FailureKind::Connectivity)
        );
        assert_eq!(results[1].name, "bookingCount");
        assert_eq!(results[2].outcome, TaskOutcome::Success(serde_json::json!(5)));
    }

    #[tokio::test]
    async fn test_all_connectivity_failures_is_unavailable() {
        // Ports with nothing listening
        let aggregator = aggregator(
            &[("listingService", 1), ("bookingService", 1)],
            vec![
                task("listingCount", "listingService"),
                task("bookingCount", "bookingService"),
            ],
            Duration::from_millis(500),
        );

        let outcome = aggregator.aggregate(&ctx()).await;
        assert_eq!(outcome, AggregateOutcome::Unavailable);
    }

    #[tokio::test]
    async fn test_contract_failure_prevents_unavailable() {
        // One backend answers with the wrong shape, the other is down. The
        // response must be degraded, not a systemic-outage signal.
        let bad_shape = start_backend(r#"{"count": 12}"#, Duration::ZERO).await;

        let aggregator = aggregator(
            &[("listingService", bad_shape), ("bookingService", 1)],
            vec![
                task("listingCount", "listingService"),
                task("bookingCount", "bookingService"),
            ],
            Duration::from_millis(500),
        );

        let outcome = aggregator.aggregate(&ctx()).await;
        let AggregateOutcome::Degraded(results) = outcome else {
            panic!("expected degraded outcome, got {outcome:?}");
        };
        assert_eq!(
            results[0].outcome,
            TaskOutcome::Failure(FailureKind::Contract)
        );
        assert_eq!(
            results[1].outcome,
            TaskOutcome::Failure(FailureKind::Connectivity)
        );
    }

    #[tokio::test]
    async fn test_resolution_failure_is_marked() {
        let listing = start_backend("12", Duration::ZERO).await;

        let aggregator = aggregator(
            &[("listingService", listing)],
            vec![
                task("listingCount", "listingService"),
                // bookingService is not configured at all
                task("bookingCount", "bookingService"),
            ],
            Duration::from_secs(5),
        );

        let outcome = aggregator.aggregate(&ctx()).await;
        let AggregateOutcome::Degraded(results) = outcome else {
            panic!("expected degraded outcome, got {outcome:?}");
        };
        assert_eq!(
            results[1].outcome,
            TaskOutcome::Failure(FailureKind::Resolution)
        );
    }

    #[tokio::test]
    async fn test_fanout_latency_is_max_not_sum() {
        let delay = Duration::from_millis(400);
        let a = start_backend("1", delay).await;
        let b = start_backend("2", delay).await;
        let c = start_backend("3", delay).await;

        let aggregator = aggregator(
            &[("a", a), ("b", b), ("c", c)],
            vec![task("aCount", "a"), task("bCount", "b"), task("cCount", "c")],
            Duration::from_secs(5),
        );

        let started = Instant::now();
        let outcome = aggregator.aggregate(&ctx()).await;
        let elapsed = started.elapsed();

        assert!(matches!(outcome, AggregateOutcome::Complete(_)));
        // Concurrent fan-out: total latency is bounded by one delay plus
        // overhead, nowhere near three delays.
        assert!(elapsed >= delay);
        assert!(
            elapsed < delay * 2,
            "fan-out took {elapsed:?}, expected about {delay:?}"
        );
    }

    #[tokio::test]
    async fn test_idempotent_shape() {
        let listing = start_backend("12", Duration::ZERO).await;

        let aggregator = aggregator(
            &[("listingService", listing)],
            vec![task("listingCount", "listingService")],
            Duration::from_secs(5),
        );

        let first = aggregator.aggregate(&ctx()).await;
        let second = aggregator.aggregate(&ctx()).await;
        assert_eq!(first, second);
    }

    #[test]
    fn test_classify_empty_task_list_is_complete() {
        assert_eq!(classify(vec![]), AggregateOutcome::Complete(vec![]));
    }
}
