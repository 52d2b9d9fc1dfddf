use shared::metrics_defs::{MetricDef, MetricType};

pub const LOGIN_ATTEMPTS: MetricDef = MetricDef {
    name: "login.attempts",
    metric_type: MetricType::Counter,
    description: "Login requests. Tagged with outcome.",
};

pub const MESSAGES_SENT: MetricDef = MetricDef {
    name: "bulk_send.messages_sent",
    metric_type: MetricType::Counter,
    description: "Messages delivered through bulk send requests",
};

pub const BULK_SEND_DURATION: MetricDef = MetricDef {
    name: "bulk_send.duration",
    metric_type: MetricType::Histogram,
    description: "Bulk send request duration in seconds. Tagged with outcome.",
};

pub const ALL_METRICS: &[MetricDef] = &[LOGIN_ATTEMPTS, MESSAGES_SENT, BULK_SEND_DURATION];
