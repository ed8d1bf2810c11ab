use anyhow::{bail, Result};
use std::time::Duration;
use swarmvet_common::{Entity, EntityKind};
use swarmvet_core::{
    ClusterQuery, DesiredStateResolver, HealthConfig, JoinVerifier, VerifyOutcome,
};

use crate::output;

pub async fn handle_verify_command(
    config: &HealthConfig,
    kind: &str,
    id: &str,
    attempts: Option<u32>,
    base_delay: Option<u64>,
    max_delay: Option<u64>,
) -> Result<i32> {
    let entity = Entity::new(parse_kind(kind)?, id);
    let desired = DesiredStateResolver::resolve(&entity, config)?;

    let mut budget = config.retry.budget();
    if let Some(n) = attempts {
        budget.max_attempts = n.max(1);
    }
    if let Some(secs) = base_delay {
        budget.base_delay = Duration::from_secs(secs);
    }
    if let Some(secs) = max_delay {
        budget.max_delay = Duration::from_secs(secs);
    }

    let query = ClusterQuery::from_config(config);
    let verifier = JoinVerifier::new(&query, config.query_timeout());

    match verifier.verify(&entity, &desired, &budget).await {
        VerifyOutcome::Converged { attempts } => {
            output::print_success(&format!(
                "{} converged after {} attempt(s)",
                entity, attempts
            ));
            Ok(0)
        }
        VerifyOutcome::Exhausted {
            attempts,
            last_reason,
        } => {
            output::print_error(&format!(
                "{} did not converge after {} attempt(s): {}",
                entity, attempts, last_reason
            ));
            Ok(1)
        }
    }
}

fn parse_kind(kind: &str) -> Result<EntityKind> {
    match kind.to_lowercase().as_str() {
        "node" => Ok(EntityKind::Node),
        "service" => Ok(EntityKind::Service),
        "network" => Ok(EntityKind::Network),
        "volume" => Ok(EntityKind::Volume),
        "probe" => Ok(EntityKind::ConnectivityProbe),
        other => bail!(
            "unknown entity kind: {} (expected node, service, network, volume, or probe)",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("node").unwrap(), EntityKind::Node);
        assert_eq!(parse_kind("Service").unwrap(), EntityKind::Service);
        assert_eq!(parse_kind("probe").unwrap(), EntityKind::ConnectivityProbe);
        assert!(parse_kind("pod").is_err());
    }
}
