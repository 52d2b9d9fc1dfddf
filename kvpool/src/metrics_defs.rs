//! Metrics definitions for the storage backend pool.

use shared::metrics_defs::{MetricDef, MetricType};

pub const BACKEND_ROTATIONS: MetricDef = MetricDef {
    name: "backend.rotation",
    metric_type: MetricType::Counter,
    description: "Number of times the pool advanced to the next backend",
};

pub const BACKEND_USAGE_CHECK_FAILED: MetricDef = MetricDef {
    name: "backend.usage_check.failed",
    metric_type: MetricType::Counter,
    description: "Number of rotation checks that could not read backend usage",
};

pub const BACKEND_COMMANDS_PROCESSED: MetricDef = MetricDef {
    name: "backend.commands_processed",
    metric_type: MetricType::Gauge,
    description: "Last observed command count of the current backend",
};

pub const SESSION_FALLBACK_HIT: MetricDef = MetricDef {
    name: "session.lookup.fallback_hit",
    metric_type: MetricType::Counter,
    description: "Session lookups answered by a backend other than the current one",
};

pub const ALL_METRICS: &[MetricDef] = &[
    BACKEND_ROTATIONS,
    BACKEND_USAGE_CHECK_FAILED,
    BACKEND_COMMANDS_PROCESSED,
    SESSION_FALLBACK_HIT,
];
