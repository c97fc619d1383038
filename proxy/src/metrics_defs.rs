use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "proxy.requests",
    metric_type: MetricType::Counter,
    description: "Inbound requests handled. Tagged with status.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "proxy.request.duration",
    metric_type: MetricType::Histogram,
    description: "End-to-end request duration in seconds",
};

pub const RESOLUTION_FAILURES: MetricDef = MetricDef {
    name: "proxy.resolution_failures",
    metric_type: MetricType::Counter,
    description: "Requests whose target service could not be resolved",
};

pub const UPSTREAM_FAILURES: MetricDef = MetricDef {
    name: "proxy.upstream_failures",
    metric_type: MetricType::Counter,
    description: "Forwarded requests that failed or timed out upstream",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUESTS,
    REQUEST_DURATION,
    RESOLUTION_FAILURES,
    UPSTREAM_FAILURES,
];
