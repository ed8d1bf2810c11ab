//! State queries against the external control plane
//!
//! `StateQuery` is the single seam between the engine and the orchestrator:
//! everything downstream (evaluation, aggregation, verification) consumes
//! observed state through this trait, so tests can substitute a scripted
//! in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use swarmvet_common::{Entity, EntityKind, ObservedState, QueryError};

use crate::desired::{HealthConfig, ProbeRule};
use crate::engine::EngineClient;
use crate::probe;

/// Fetches current observed state for a named entity.
#[async_trait]
pub trait StateQuery: Send + Sync {
    /// Fetch a fresh snapshot of the entity's state.
    ///
    /// Implementations must be timeout-bounded and must not retry
    /// internally; retries are the verifier's responsibility.
    async fn fetch(&self, entity: &Entity) -> Result<ObservedState, QueryError>;
}

/// Production state query: the control plane HTTP API for cluster objects,
/// direct socket probes for connectivity entities.
pub struct ClusterQuery {
    engine: EngineClient,
    probes: HashMap<String, ProbeRule>,
    probe_timeout: Duration,
}

impl ClusterQuery {
    pub fn new(engine: EngineClient, probe_timeout: Duration) -> Self {
        Self {
            engine,
            probes: HashMap::new(),
            probe_timeout,
        }
    }

    /// Build the query layer from health-check configuration.
    pub fn from_config(config: &HealthConfig) -> Self {
        let engine = EngineClient::new(&config.endpoint, config.query_timeout());
        let mut query = Self::new(engine, config.query_timeout());
        for rule in &config.probes {
            query.probes.insert(rule.name.clone(), rule.clone());
        }
        query
    }
}

#[async_trait]
impl StateQuery for ClusterQuery {
    async fn fetch(&self, entity: &Entity) -> Result<ObservedState, QueryError> {
        match entity.kind {
            EntityKind::ConnectivityProbe => {
                let rule = self.probes.get(&entity.id).ok_or_else(|| {
                    QueryError::Malformed(format!("no probe target named {}", entity.id))
                })?;
                Ok(probe::run(entity, rule, self.probe_timeout).await)
            }
            _ => self.engine.fetch(entity).await,
        }
    }
}
