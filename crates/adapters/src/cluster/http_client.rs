use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use domain::common::error::RunnerError;
use ports::secondary::cluster_port::{BulkItemResult, BulkOp, ClusterPort, SecurityContext};

/// Header carrying the injected run-as roles, read by the security plugin
/// in front of the cluster. Absent for stashed (node-identity) requests.
const INJECTED_ROLES_HEADER: &str = "x-watchtower-injected-roles";

/// HTTP client against an Elasticsearch-class search/index cluster.
pub struct HttpClusterClient {
    http: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpClusterClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            username: None,
            password: None,
        }
    }

    #[must_use]
    pub fn with_basic_auth(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}/{path}", self.base_url));
        if let Some(username) = &self.username {
            builder = builder.basic_auth(username, self.password.as_deref());
        }
        builder
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, RunnerError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RunnerError::Cluster(format!("failed to read response body: {e}")))?;
        if !(200..300).contains(&status) {
            return Err(RunnerError::ClusterStatus {
                status,
                message: first_error_reason(&body).unwrap_or(body),
            });
        }
        serde_json::from_str(&body)
            .map_err(|e| RunnerError::Cluster(format!("malformed response body: {e}")))
    }
}

impl ClusterPort for HttpClusterClient {
    fn search<'a>(
        &'a self,
        indices: &'a [String],
        routing: Option<&'a str>,
        source: &'a Value,
        security: &'a SecurityContext,
    ) -> Pin<Box<dyn Future<Output = Result<Value, RunnerError>> + Send + 'a>> {
        Box::pin(async move {
            let mut request = self
                .request(reqwest::Method::POST, &search_path(indices))
                .json(source);
            if let Some(routing) = routing {
                request = request.query(&[("routing", routing)]);
            }
            if let SecurityContext::Injected { monitor_id, roles } = security {
                request = request.header(
                    INJECTED_ROLES_HEADER,
                    injected_roles_value(monitor_id, roles),
                );
            }
            let response = request
                .send()
                .await
                .map_err(|e| RunnerError::Cluster(format!("search request failed: {e}")))?;
            Self::read_json(response).await
        })
    }

    fn bulk<'a>(
        &'a self,
        ops: &'a [BulkOp],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<BulkItemResult>, RunnerError>> + Send + 'a>> {
        Box::pin(async move {
            let body = bulk_body(ops)?;
            let response = self
                .request(reqwest::Method::POST, "_bulk")
                .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                .body(body)
                .send()
                .await
                .map_err(|e| RunnerError::Cluster(format!("bulk request failed: {e}")))?;
            let body = Self::read_json(response).await?;
            Ok(parse_bulk_items(&body))
        })
    }

    fn index_exists<'a>(
        &'a self,
        index: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, RunnerError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .request(reqwest::Method::HEAD, index)
                .send()
                .await
                .map_err(|e| RunnerError::Cluster(format!("exists request failed: {e}")))?;
            match response.status().as_u16() {
                200 => Ok(true),
                404 => Ok(false),
                status => Err(RunnerError::ClusterStatus {
                    status,
                    message: format!("unexpected status probing index {index}"),
                }),
            }
        })
    }

    fn create_index<'a>(
        &'a self,
        index: &'a str,
        body: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), RunnerError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .request(reqwest::Method::PUT, index)
                .json(body)
                .send()
                .await
                .map_err(|e| RunnerError::Cluster(format!("create index failed: {e}")))?;
            match Self::read_json(response).await {
                Ok(_) => Ok(()),
                // Lost the creation race: someone else just made it.
                Err(RunnerError::ClusterStatus { message, .. })
                    if message.contains("resource_already_exists_exception") =>
                {
                    tracing::debug!(index, "index already exists");
                    Ok(())
                }
                Err(error) => Err(error),
            }
        })
    }
}

fn search_path(indices: &[String]) -> String {
    format!("{}/_search", indices.join(","))
}

fn injected_roles_value(monitor_id: &str, roles: &[String]) -> String {
    format!("{monitor_id}|{}", roles.join(","))
}

/// Newline-delimited bulk body: one action line per op, followed by the
/// document source for index ops.
fn bulk_body(ops: &[BulkOp]) -> Result<String, RunnerError> {
    let mut body = String::new();
    for op in ops {
        let (action, source) = match op {
            BulkOp::Index {
                index,
                id,
                routing,
                source,
            } => {
                let mut meta = serde_json::json!({"_index": index, "routing": routing});
                if let Some(id) = id {
                    meta["_id"] = Value::String(id.clone());
                }
                (serde_json::json!({"index": meta}), Some(source))
            }
            BulkOp::Delete { index, id, routing } => (
                serde_json::json!({"delete": {"_index": index, "_id": id, "routing": routing}}),
                None,
            ),
        };
        body.push_str(&action.to_string());
        body.push('\n');
        if let Some(source) = source {
            body.push_str(
                &serde_json::to_string(source)
                    .map_err(|e| RunnerError::Cluster(format!("unserializable bulk source: {e}")))?,
            );
            body.push('\n');
        }
    }
    Ok(body)
}

fn parse_bulk_items(response: &Value) -> Vec<BulkItemResult> {
    response["items"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let (_, detail) = item.as_object()?.iter().next()?;
            Some(BulkItemResult {
                id: detail["_id"].as_str().unwrap_or_default().to_string(),
                status: u16::try_from(detail["status"].as_u64().unwrap_or(0)).unwrap_or(0),
                error: detail.get("error").map(|error| {
                    error["reason"]
                        .as_str()
                        .map_or_else(|| error.to_string(), str::to_string)
                }),
            })
        })
        .collect()
}

fn first_error_reason(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed["error"]["reason"].as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_path_joins_index_patterns() {
        let indices = vec!["logs-*".to_string(), "traces-*".to_string()];
        assert_eq!(search_path(&indices), "logs-*,traces-*/_search");
    }

    #[test]
    fn injected_roles_header_format() {
        let roles = vec!["ops".to_string(), "sre".to_string()];
        assert_eq!(injected_roles_value("m1", &roles), "m1|ops,sre");
    }

    #[test]
    fn bulk_body_interleaves_actions_and_sources() {
        let ops = vec![
            BulkOp::Index {
                index: ".watchtower-alerts".to_string(),
                id: Some("a1".to_string()),
                routing: "m1".to_string(),
                source: json!({"state": "ACTIVE"}),
            },
            BulkOp::Delete {
                index: ".watchtower-alerts".to_string(),
                id: "a2".to_string(),
                routing: "m1".to_string(),
            },
        ];

        let body = bulk_body(&ops).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["index"]["_index"], ".watchtower-alerts");
        assert_eq!(first["index"]["_id"], "a1");
        assert_eq!(first["index"]["routing"], "m1");

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["state"], "ACTIVE");

        let third: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(third["delete"]["_id"], "a2");
        assert!(body.ends_with('\n'), "bulk body must end with a newline");
    }

    #[test]
    fn bulk_body_omits_id_for_cluster_assigned_docs() {
        let ops = vec![BulkOp::Index {
            index: "idx".to_string(),
            id: None,
            routing: "m1".to_string(),
            source: json!({}),
        }];
        let body = bulk_body(&ops).unwrap();
        let action: Value = serde_json::from_str(body.lines().next().unwrap()).unwrap();
        assert!(action["index"].get("_id").is_none());
    }

    #[test]
    fn parse_bulk_items_reads_mixed_ops_in_order() {
        let response = json!({
            "items": [
                {"index": {"_id": "a1", "status": 201}},
                {"delete": {"_id": "a2", "status": 200}},
                {"index": {
                    "_id": "a3",
                    "status": 429,
                    "error": {"type": "es_rejected_execution_exception", "reason": "queue full"},
                }},
            ],
        });

        let items = parse_bulk_items(&response);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, "a1");
        assert!(!items[0].is_failed());
        assert_eq!(items[1].id, "a2");
        assert!(items[2].is_too_many_requests());
        assert_eq!(items[2].error.as_deref(), Some("queue full"));
    }

    #[test]
    fn first_error_reason_extracted_from_error_body() {
        let body = r#"{"error":{"type":"index_not_found_exception","reason":"no such index [x]"},"status":404}"#;
        assert_eq!(first_error_reason(body).unwrap(), "no such index [x]");
        assert_eq!(first_error_reason("not json"), None);
    }
}
