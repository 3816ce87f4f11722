use std::time::Duration;

// ── Paths and endpoints ────────────────────────────────────────────

pub const DEFAULT_SETTINGS_PATH: &str = "/etc/watchtower/runner.yaml";
pub const DEFAULT_CLUSTER_ENDPOINT: &str = "http://127.0.0.1:9200";

// ── Channel capacities ─────────────────────────────────────────────

/// API-triggered settings-reload nudges; reloads coalesce, so tiny is fine.
pub const RELOAD_TRIGGER_CAPACITY: usize = 4;

// ── Timeouts ───────────────────────────────────────────────────────

pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
