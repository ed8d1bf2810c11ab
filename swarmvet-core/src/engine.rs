//! HTTP client for the control plane REST API
//!
//! Reads node, service, network, and volume state from the orchestration
//! engine and normalizes each response into an `ObservedState` field map.
//! Every call is bounded by the configured timeout; failures map onto the
//! query-error taxonomy (unreachable, timeout, malformed) so the aggregator
//! can fold them into the report instead of aborting.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use swarmvet_common::{Entity, EntityKind, FieldValue, ObservedState, QueryError};

pub struct EngineClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl EngineClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Fetch observed state for one entity. No internal retries.
    pub async fn fetch(&self, entity: &Entity) -> Result<ObservedState, QueryError> {
        tokio::time::timeout(self.timeout, self.fetch_inner(entity))
            .await
            .map_err(|_| QueryError::Timeout(self.timeout))?
    }

    async fn fetch_inner(&self, entity: &Entity) -> Result<ObservedState, QueryError> {
        let path = match entity.kind {
            EntityKind::Node => format!("/v1/nodes/{}", entity.id),
            EntityKind::Service => format!("/v1/services/{}", entity.id),
            EntityKind::Network => format!("/v1/networks/{}", entity.id),
            EntityKind::Volume => format!("/v1/volumes/{}", entity.id),
            EntityKind::ConnectivityProbe => {
                return Err(QueryError::Malformed(
                    "connectivity probes are not served by the engine API".to_string(),
                ));
            }
        };

        let body = self.get(&path).await?;
        let mut observed = ObservedState::new(entity.clone());
        observed.fields = parse_fields(entity.kind, &body)?;
        Ok(observed)
    }

    async fn get(&self, path: &str) -> Result<String, QueryError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QueryError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Malformed(format!(
                "{} returned {}",
                path, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| QueryError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct NodeState {
    status: String,
    availability: String,
    role: String,
    #[serde(default)]
    labels: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceState {
    mode: String,
    replicas_running: u64,
    #[serde(default)]
    replicas_desired: Option<u64>,
    #[serde(default)]
    eligible_nodes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct NetworkState {
    driver: String,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VolumeState {
    driver: String,
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, QueryError> {
    serde_json::from_str(body).map_err(|e| QueryError::Malformed(e.to_string()))
}

/// Normalize an engine API response body into an observed field map.
fn parse_fields(
    kind: EntityKind,
    body: &str,
) -> Result<BTreeMap<String, FieldValue>, QueryError> {
    let mut fields = BTreeMap::new();

    match kind {
        EntityKind::Node => {
            let state: NodeState = decode(body)?;
            fields.insert("status".to_string(), FieldValue::Str(state.status));
            fields.insert(
                "availability".to_string(),
                FieldValue::Str(state.availability),
            );
            fields.insert("role".to_string(), FieldValue::Str(state.role));
            fields.insert("labels".to_string(), FieldValue::Labels(state.labels));
        }
        EntityKind::Service => {
            let state: ServiceState = decode(body)?;
            fields.insert("mode".to_string(), FieldValue::Str(state.mode));
            fields.insert(
                "replicas_running".to_string(),
                FieldValue::Count(state.replicas_running),
            );
            if let Some(desired) = state.replicas_desired {
                fields.insert("replicas_desired".to_string(), FieldValue::Count(desired));
            }
            if let Some(eligible) = state.eligible_nodes {
                fields.insert("eligible_nodes".to_string(), FieldValue::Count(eligible));
            }
        }
        EntityKind::Network => {
            let state: NetworkState = decode(body)?;
            fields.insert("driver".to_string(), FieldValue::Str(state.driver));
            if let Some(scope) = state.scope {
                fields.insert("scope".to_string(), FieldValue::Str(scope));
            }
        }
        EntityKind::Volume => {
            let state: VolumeState = decode(body)?;
            fields.insert("driver".to_string(), FieldValue::Str(state.driver));
        }
        EntityKind::ConnectivityProbe => {
            return Err(QueryError::Malformed(
                "connectivity probes are not served by the engine API".to_string(),
            ));
        }
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_response() {
        let body = r#"{
            "status": "ready",
            "availability": "active",
            "role": "manager",
            "labels": ["dns", "web"]
        }"#;

        let fields = parse_fields(EntityKind::Node, body).unwrap();
        assert_eq!(
            fields.get("status"),
            Some(&FieldValue::Str("ready".to_string()))
        );
        assert_eq!(
            fields.get("role"),
            Some(&FieldValue::Str("manager".to_string()))
        );

        let labels: BTreeSet<String> =
            ["dns".to_string(), "web".to_string()].into_iter().collect();
        assert_eq!(fields.get("labels"), Some(&FieldValue::Labels(labels)));
    }

    #[test]
    fn test_parse_replicated_service() {
        let body = r#"{
            "mode": "replicated",
            "replicas_running": 3,
            "replicas_desired": 3
        }"#;

        let fields = parse_fields(EntityKind::Service, body).unwrap();
        assert_eq!(
            fields.get("replicas_running"),
            Some(&FieldValue::Count(3))
        );
        assert!(!fields.contains_key("eligible_nodes"));
    }

    #[test]
    fn test_parse_global_service() {
        let body = r#"{
            "mode": "global",
            "replicas_running": 5,
            "eligible_nodes": 5
        }"#;

        let fields = parse_fields(EntityKind::Service, body).unwrap();
        assert_eq!(fields.get("eligible_nodes"), Some(&FieldValue::Count(5)));
    }

    #[test]
    fn test_malformed_body_is_malformed_error() {
        let err = parse_fields(EntityKind::Node, "not json").unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));

        // Valid JSON but missing required fields is also malformed
        let err = parse_fields(EntityKind::Node, r#"{"status": "ready"}"#).unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_engine() {
        // Nothing listens on the discard port
        let client = EngineClient::new("http://127.0.0.1:9", Duration::from_secs(5));
        let err = client.fetch(&Entity::node("n1")).await.unwrap_err();
        assert!(matches!(err, QueryError::Unreachable(_)));
    }
}
