use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "aggregator.requests",
    metric_type: MetricType::Counter,
    description: "Inbound requests handled. Tagged with status.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "aggregator.request.duration",
    metric_type: MetricType::Histogram,
    description: "End-to-end request duration in seconds",
};

pub const TASK_FAILURES: MetricDef = MetricDef {
    name: "aggregator.task_failures",
    metric_type: MetricType::Counter,
    description: "Downstream task failures. Tagged with kind.",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUESTS, REQUEST_DURATION, TASK_FAILURES];
