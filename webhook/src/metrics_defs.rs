use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "webhook.requests",
    metric_type: MetricType::Counter,
    description: "Number of webhook requests handled. Tagged with status.",
};

pub const FETCH_DURATION: MetricDef = MetricDef {
    name: "webhook.fetch.duration",
    metric_type: MetricType::Histogram,
    description: "Time to retrieve an external config in seconds. Tagged with scheme, outcome.",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUESTS, FETCH_DURATION];
