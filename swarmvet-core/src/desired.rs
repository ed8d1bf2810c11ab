//! Desired-state rules and resolution
//!
//! Configuration supplies one rule per entity; the resolver turns a rule
//! into the typed predicate set the evaluator consumes. Resolution is a pure
//! function of configuration and fails fast when required rules are missing,
//! so an incomplete config never silently skips validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use swarmvet_common::{
    DesiredState, Entity, EntityKind, Error, Expectation, Result, RetryBudget,
};

/// Connectivity probe protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeProtocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for ProbeProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Desired reachability of a host:port endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRule {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: ProbeProtocol,
}

/// Desired state of a cluster node. Status "ready" is always expected;
/// role, availability, and labels are checked only when configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRule {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

/// Desired state of a service: either a fixed replica target or global
/// mode (one task per eligible node). One of the two is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRule {
    pub name: String,
    #[serde(default)]
    pub replicas: Option<u64>,
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRule {
    pub name: String,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRule {
    pub name: String,
    #[serde(default)]
    pub driver: Option<String>,
}

/// Retry budget parameters for convergence verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_secs() -> u64 {
    1
}

fn default_max_delay_secs() -> u64 {
    30
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetryConfig {
    pub fn budget(&self) -> RetryBudget {
        RetryBudget::new(
            self.max_attempts,
            Duration::from_secs(self.base_delay_secs),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

/// Health-check configuration: control plane endpoint, per-query timeout,
/// retry budget, and the set of entities to verify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub nodes: Vec<NodeRule>,
    #[serde(default)]
    pub services: Vec<ServiceRule>,
    #[serde(default)]
    pub networks: Vec<NetworkRule>,
    #[serde(default)]
    pub volumes: Vec<VolumeRule>,
    #[serde(default)]
    pub probes: Vec<ProbeRule>,
}

fn default_endpoint() -> String {
    "http://localhost:2375".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
            nodes: Vec::new(),
            services: Vec::new(),
            networks: Vec::new(),
            volumes: Vec::new(),
            probes: Vec::new(),
        }
    }
}

impl HealthConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Entities to check, in the fixed pipeline order:
    /// nodes, services, networks, volumes, connectivity probes.
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities = Vec::new();
        entities.extend(self.nodes.iter().map(|r| Entity::node(&r.name)));
        entities.extend(self.services.iter().map(|r| Entity::service(&r.name)));
        entities.extend(self.networks.iter().map(|r| Entity::network(&r.name)));
        entities.extend(self.volumes.iter().map(|r| Entity::volume(&r.name)));
        entities.extend(self.probes.iter().map(|r| Entity::probe(&r.name)));
        entities
    }
}

/// Computes the expected target state for an entity from configuration.
pub struct DesiredStateResolver;

impl DesiredStateResolver {
    /// Resolve the desired state for one entity. Pure; no side effects.
    pub fn resolve(entity: &Entity, config: &HealthConfig) -> Result<DesiredState> {
        match entity.kind {
            EntityKind::Node => {
                let rule = config
                    .nodes
                    .iter()
                    .find(|r| r.name == entity.id)
                    .ok_or_else(|| missing_rule(entity))?;

                let mut desired = DesiredState::new(entity.clone())
                    .expect("status", Expectation::Equals("ready".to_string()));
                if let Some(role) = &rule.role {
                    desired = desired.expect("role", Expectation::Equals(role.clone()));
                }
                if let Some(availability) = &rule.availability {
                    desired = desired
                        .expect("availability", Expectation::Equals(availability.clone()));
                }
                if !rule.labels.is_empty() {
                    desired = desired
                        .expect("labels", Expectation::LabelsInclude(rule.labels.clone()));
                }
                Ok(desired)
            }
            EntityKind::Service => {
                let rule = config
                    .services
                    .iter()
                    .find(|r| r.name == entity.id)
                    .ok_or_else(|| missing_rule(entity))?;

                let desired = DesiredState::new(entity.clone());
                if rule.global {
                    Ok(desired
                        .expect("replicas_running", Expectation::RunningOnAllEligible))
                } else if let Some(replicas) = rule.replicas {
                    Ok(desired
                        .expect("replicas_running", Expectation::ReplicaCount(replicas)))
                } else {
                    Err(Error::Config(format!(
                        "service {} needs either a replica target or global mode",
                        entity.id
                    )))
                }
            }
            EntityKind::Network => {
                let rule = config
                    .networks
                    .iter()
                    .find(|r| r.name == entity.id)
                    .ok_or_else(|| missing_rule(entity))?;

                let mut desired = DesiredState::new(entity.clone());
                if let Some(driver) = &rule.driver {
                    desired = desired.expect("driver", Expectation::Equals(driver.clone()));
                }
                if let Some(scope) = &rule.scope {
                    desired = desired.expect("scope", Expectation::Equals(scope.clone()));
                }
                Ok(desired)
            }
            EntityKind::Volume => {
                let rule = config
                    .volumes
                    .iter()
                    .find(|r| r.name == entity.id)
                    .ok_or_else(|| missing_rule(entity))?;

                let mut desired = DesiredState::new(entity.clone());
                if let Some(driver) = &rule.driver {
                    desired = desired.expect("driver", Expectation::Equals(driver.clone()));
                }
                Ok(desired)
            }
            EntityKind::ConnectivityProbe => {
                config
                    .probes
                    .iter()
                    .find(|r| r.name == entity.id)
                    .ok_or_else(|| missing_rule(entity))?;

                Ok(DesiredState::new(entity.clone())
                    .expect("reachable", Expectation::Equals("yes".to_string())))
            }
        }
    }
}

fn missing_rule(entity: &Entity) -> Error {
    Error::Config(format!("no desired-state rule for {}", entity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_rule_defaults_to_ready() {
        let config = HealthConfig {
            nodes: vec![NodeRule {
                name: "worker-1".to_string(),
                role: None,
                availability: None,
                labels: BTreeSet::new(),
            }],
            ..Default::default()
        };

        let desired =
            DesiredStateResolver::resolve(&Entity::node("worker-1"), &config).unwrap();
        assert_eq!(
            desired.fields.get("status"),
            Some(&Expectation::Equals("ready".to_string()))
        );
        assert!(!desired.fields.contains_key("role"));
    }

    #[test]
    fn test_service_without_target_is_config_error() {
        let config = HealthConfig {
            services: vec![ServiceRule {
                name: "web".to_string(),
                replicas: None,
                global: false,
            }],
            ..Default::default()
        };

        let err =
            DesiredStateResolver::resolve(&Entity::service("web"), &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_global_service_uses_eligible_node_predicate() {
        let config = HealthConfig {
            services: vec![ServiceRule {
                name: "agent".to_string(),
                replicas: None,
                global: true,
            }],
            ..Default::default()
        };

        let desired =
            DesiredStateResolver::resolve(&Entity::service("agent"), &config).unwrap();
        assert_eq!(
            desired.fields.get("replicas_running"),
            Some(&Expectation::RunningOnAllEligible)
        );
    }

    #[test]
    fn test_missing_rule_is_config_error() {
        let config = HealthConfig::default();
        let err =
            DesiredStateResolver::resolve(&Entity::node("ghost"), &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_pipeline_order() {
        let config = HealthConfig {
            volumes: vec![VolumeRule {
                name: "data".to_string(),
                driver: None,
            }],
            nodes: vec![NodeRule {
                name: "n1".to_string(),
                role: None,
                availability: None,
                labels: BTreeSet::new(),
            }],
            services: vec![ServiceRule {
                name: "web".to_string(),
                replicas: Some(3),
                global: false,
            }],
            ..Default::default()
        };

        let kinds: Vec<EntityKind> =
            config.entities().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EntityKind::Node, EntityKind::Service, EntityKind::Volume]
        );
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            endpoint = "http://10.0.0.1:2375"

            [[nodes]]
            name = "manager-1"
            role = "manager"
            labels = ["dns", "web"]

            [[services]]
            name = "web"
            replicas = 3

            [[probes]]
            name = "dns"
            host = "10.0.0.53"
            port = 53
            protocol = "udp"
        "#;

        let config: HealthConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoint, "http://10.0.0.1:2375");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.probes[0].protocol, ProbeProtocol::Udp);
        assert_eq!(config.retry.budget().max_attempts, 5);
    }
}
