use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use domain::common::error::{RunnerError, STATUS_TOO_MANY_REQUESTS};

/// Security context a search executes under.
///
/// Monitor inputs run `Injected` with the monitor owner's backend roles so
/// document-level security applies to the owner, not the node. Reads of the
/// runner's own system indices, and anomaly-result searches (which add an
/// explicit owner-role filter instead), run `Stashed` with the node's own
/// identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityContext {
    Injected {
        monitor_id: String,
        roles: Vec<String>,
    },
    Stashed,
}

/// One operation of a bulk write. All alert writes are routed by monitor id
/// so every alert of a monitor lands on one shard.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOp {
    Index {
        index: String,
        /// `None` lets the cluster assign the document id.
        id: Option<String>,
        routing: String,
        source: Value,
    },
    Delete {
        index: String,
        id: String,
        routing: String,
    },
}

/// Per-item outcome of a bulk write, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    /// Document id (cluster-assigned for id-less index ops).
    pub id: String,
    pub status: u16,
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn is_failed(&self) -> bool {
        self.status >= 400
    }

    /// Backpressure rejection; the only retriable item failure.
    pub fn is_too_many_requests(&self) -> bool {
        self.status == STATUS_TOO_MANY_REQUESTS
    }
}

/// Secondary port to the search/index cluster.
///
/// `Pin<Box<dyn Future>>` returns keep the trait dyn-compatible, same shape
/// as the other async ports.
pub trait ClusterPort: Send + Sync {
    /// Execute a search and return the raw response body.
    ///
    /// A non-success HTTP status must surface as
    /// [`RunnerError::ClusterStatus`]; shard-level failures inside a 200
    /// response are left to the caller.
    fn search<'a>(
        &'a self,
        indices: &'a [String],
        routing: Option<&'a str>,
        source: &'a Value,
        security: &'a SecurityContext,
    ) -> Pin<Box<dyn Future<Output = Result<Value, RunnerError>> + Send + 'a>>;

    /// Submit a mixed bulk of index/delete ops; per-item statuses are
    /// reported in request order.
    fn bulk<'a>(
        &'a self,
        ops: &'a [BulkOp],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<BulkItemResult>, RunnerError>> + Send + 'a>>;

    fn index_exists<'a>(
        &'a self,
        index: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, RunnerError>> + Send + 'a>>;

    /// Create an index; racing with another creator must not fail.
    fn create_index<'a>(
        &'a self,
        index: &'a str,
        body: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), RunnerError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_item_status_classification() {
        let created = BulkItemResult {
            id: "1".to_string(),
            status: 201,
            error: None,
        };
        assert!(!created.is_failed());
        assert!(!created.is_too_many_requests());

        let rejected = BulkItemResult {
            id: "2".to_string(),
            status: 429,
            error: Some("rejected execution".to_string()),
        };
        assert!(rejected.is_failed());
        assert!(rejected.is_too_many_requests());

        let mapper_error = BulkItemResult {
            id: "3".to_string(),
            status: 400,
            error: Some("mapper_parsing_exception".to_string()),
        };
        assert!(mapper_error.is_failed());
        assert!(!mapper_error.is_too_many_requests());
    }
}
