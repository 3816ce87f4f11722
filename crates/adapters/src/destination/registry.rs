use std::future::Future;
use std::pin::Pin;
use std::slice;
use std::sync::Arc;

use serde_json::json;

use domain::common::error::RunnerError;
use domain::destination::entity::{CONFIG_INDEX, Destination};
use ports::secondary::cluster_port::{ClusterPort, SecurityContext};
use ports::secondary::destination_port::DestinationRegistry;

/// Destination lookup backed by the shared config index.
pub struct ConfigIndexDestinationRegistry {
    cluster: Arc<dyn ClusterPort>,
    config_index: String,
}

impl ConfigIndexDestinationRegistry {
    pub fn new(cluster: Arc<dyn ClusterPort>) -> Self {
        Self {
            cluster,
            config_index: CONFIG_INDEX.to_string(),
        }
    }

    #[must_use]
    pub fn with_index(mut self, config_index: String) -> Self {
        self.config_index = config_index;
        self
    }
}

impl DestinationRegistry for ConfigIndexDestinationRegistry {
    fn get<'a>(
        &'a self,
        destination_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Destination, RunnerError>> + Send + 'a>> {
        Box::pin(async move {
            let source = json!({
                "size": 1,
                "query": {"ids": {"values": [destination_id]}},
            });
            let response = self
                .cluster
                .search(
                    slice::from_ref(&self.config_index),
                    None,
                    &source,
                    &SecurityContext::Stashed,
                )
                .await?;

            let hit = response["hits"]["hits"].get(0).ok_or_else(|| {
                RunnerError::Destination(format!("destination {destination_id} not found"))
            })?;
            // Destination documents are nested under a `destination` key in
            // the shared config index.
            let doc = hit["_source"]
                .get("destination")
                .unwrap_or(&hit["_source"]);
            let mut destination: Destination =
                serde_json::from_value(doc.clone()).map_err(|e| {
                    RunnerError::Destination(format!(
                        "malformed destination document {destination_id}: {e}"
                    ))
                })?;
            destination.id = destination_id.to_string();
            Ok(destination)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::destination::entity::DestinationType;
    use ports::secondary::cluster_port::{BulkItemResult, BulkOp};
    use serde_json::Value;
    use std::sync::Mutex;

    struct MockCluster {
        response: Value,
        calls: Mutex<Vec<(Vec<String>, Value)>>,
    }

    impl ClusterPort for MockCluster {
        fn search<'a>(
            &'a self,
            indices: &'a [String],
            _routing: Option<&'a str>,
            source: &'a Value,
            _security: &'a SecurityContext,
        ) -> Pin<Box<dyn Future<Output = Result<Value, RunnerError>> + Send + 'a>> {
            self.calls
                .lock()
                .unwrap()
                .push((indices.to_vec(), source.clone()));
            let response = self.response.clone();
            Box::pin(async move { Ok(response) })
        }

        fn bulk<'a>(
            &'a self,
            _ops: &'a [BulkOp],
        ) -> Pin<Box<dyn Future<Output = Result<Vec<BulkItemResult>, RunnerError>> + Send + 'a>>
        {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn index_exists<'a>(
            &'a self,
            _index: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<bool, RunnerError>> + Send + 'a>> {
            Box::pin(async { Ok(true) })
        }

        fn create_index<'a>(
            &'a self,
            _index: &'a str,
            _body: &'a Value,
        ) -> Pin<Box<dyn Future<Output = Result<(), RunnerError>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn registry_with(response: Value) -> (Arc<MockCluster>, ConfigIndexDestinationRegistry) {
        let cluster = Arc::new(MockCluster {
            response,
            calls: Mutex::new(Vec::new()),
        });
        let registry = ConfigIndexDestinationRegistry::new(Arc::clone(&cluster) as Arc<dyn ClusterPort>);
        (cluster, registry)
    }

    #[tokio::test]
    async fn resolves_nested_destination_document() {
        let (cluster, registry) = registry_with(json!({
            "hits": {"hits": [{
                "_id": "d1",
                "_source": {"destination": {
                    "name": "ops slack",
                    "type": "slack",
                    "slack": {"url": "https://hooks.slack.example/x"},
                }},
            }]},
        }));

        let destination = registry.get("d1").await.unwrap();
        assert_eq!(destination.id, "d1");
        assert_eq!(destination.dest_type, DestinationType::Slack);
        assert_eq!(destination.name, "ops slack");

        let calls = cluster.calls.lock().unwrap();
        assert_eq!(calls[0].0, vec![CONFIG_INDEX.to_string()]);
        assert_eq!(calls[0].1["query"]["ids"]["values"][0], "d1");
    }

    #[tokio::test]
    async fn resolves_flat_destination_document() {
        let (_, registry) = registry_with(json!({
            "hits": {"hits": [{
                "_id": "d2",
                "_source": {
                    "name": "room",
                    "type": "chime",
                    "chime": {"url": "https://hooks.chime.example/r"},
                },
            }]},
        }));

        let destination = registry.get("d2").await.unwrap();
        assert_eq!(destination.dest_type, DestinationType::Chime);
    }

    #[tokio::test]
    async fn missing_destination_is_an_error() {
        let (_, registry) = registry_with(json!({"hits": {"hits": []}}));
        let error = registry.get("nope").await.unwrap_err();
        assert!(error.to_string().contains("not found"), "{error}");
    }

    #[tokio::test]
    async fn malformed_document_is_an_error() {
        let (_, registry) = registry_with(json!({
            "hits": {"hits": [{"_id": "d3", "_source": {"name": "broken"}}]},
        }));
        let error = registry.get("d3").await.unwrap_err();
        assert!(error.to_string().contains("malformed"), "{error}");
    }
}
