//! Common types for metrics definitions.
//!
//! Each crate declares its metrics as `MetricDef` constants in a
//! `metrics_defs.rs` table, so names and types live in one reviewable place.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl MetricType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "Counter",
            MetricType::Gauge => "Gauge",
            MetricType::Histogram => "Histogram",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

impl MetricDef {
    /// Untagged counter increment. Call sites needing tags go through
    /// `metrics::counter!(DEF.name, "tag" => value)` directly.
    pub fn incr(&self, value: u64) {
        metrics::counter!(self.name).increment(value);
    }

    pub fn record(&self, value: f64) {
        metrics::histogram!(self.name).record(value);
    }

    pub fn set(&self, value: f64) {
        metrics::gauge!(self.name).set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COUNTER: MetricDef = MetricDef {
        name: "test.counter",
        metric_type: MetricType::Counter,
        description: "test",
    };

    #[test]
    fn test_emit_without_recorder_is_noop() {
        // No recorder installed in tests; emission must not panic.
        TEST_COUNTER.incr(1);
        TEST_COUNTER.record(0.5);
        assert_eq!(TEST_COUNTER.metric_type.as_str(), "Counter");
    }
}
