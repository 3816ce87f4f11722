use thiserror::Error;

/// HTTP status the cluster returns when a write queue is saturated.
/// Bulk items carrying this status are the only retriable item failures.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, Error)]
pub enum RunnerError {
    /// The scheduler handed us a job kind this runner does not own.
    #[error("invalid job kind: {0}")]
    InvalidJob(String),

    /// A monitor input kind the runner cannot execute.
    #[error("unsupported input kind: {0}")]
    UnsupportedInput(String),

    /// Persisting an ACKNOWLEDGED or DELETED alert through the save path.
    /// The composer never emits these states, so hitting this is a bug in
    /// the caller, not a runtime condition.
    #[error("unexpected attempt to save {state} alert for trigger {trigger_id}")]
    IllegalAlertState { state: String, trigger_id: String },

    /// The cluster answered with a non-success status.
    #[error("cluster responded {status}: {message}")]
    ClusterStatus { status: u16, message: String },

    /// The cluster request never produced a response (transport failure,
    /// malformed response body).
    #[error("cluster request failed: {0}")]
    Cluster(String),

    /// Script or template compilation/execution failure.
    #[error("script failure: {0}")]
    Script(String),

    /// Destination lookup, rendering policy, or publish failure.
    #[error("destination failure: {0}")]
    Destination(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RunnerError {
    /// True for per-request or per-item backpressure rejections, the only
    /// error class the constant-backoff save loop resubmits.
    pub fn is_too_many_requests(&self) -> bool {
        matches!(
            self,
            RunnerError::ClusterStatus {
                status: STATUS_TOO_MANY_REQUESTS,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_requests_matches_only_429() {
        let backpressure = RunnerError::ClusterStatus {
            status: STATUS_TOO_MANY_REQUESTS,
            message: "rejected".to_string(),
        };
        assert!(backpressure.is_too_many_requests());

        let not_found = RunnerError::ClusterStatus {
            status: 404,
            message: "no such index".to_string(),
        };
        assert!(!not_found.is_too_many_requests());

        let transport = RunnerError::Cluster("connection reset".to_string());
        assert!(!transport.is_too_many_requests());
    }

    #[test]
    fn display_includes_context() {
        let err = RunnerError::IllegalAlertState {
            state: "ACKNOWLEDGED".to_string(),
            trigger_id: "t1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ACKNOWLEDGED"), "got: {msg}");
        assert!(msg.contains("t1"), "got: {msg}");
    }
}
