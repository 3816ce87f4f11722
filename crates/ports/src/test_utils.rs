use crate::secondary::metrics_port::MetricsPort;

/// No-op metrics for tests; every method inherits the default no-op body.
pub struct NoopMetrics;

impl MetricsPort for NoopMetrics {}
