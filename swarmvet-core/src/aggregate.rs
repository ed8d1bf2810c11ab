//! Health aggregation pipeline
//!
//! Runs the fixed entity pipeline (nodes, services, networks, volumes,
//! connectivity probes), one concurrent check per entity, and reduces the
//! per-entity verdicts into a single ordered report. Checks are independent
//! reads: results come back in pipeline order no matter which check
//! finishes first, because ordering is a property of result assembly, not
//! of scheduling. A query failure on one entity becomes that entity's
//! check result; it never aborts the run.

use futures::future;
use std::time::Duration;
use swarmvet_common::{
    AggregateReport, CheckResult, DesiredState, Entity, EntityKind, QueryError, Result,
    Severity, Verdict,
};
use tracing::{info, warn};

use crate::desired::{DesiredStateResolver, HealthConfig};
use crate::evaluate::evaluate;
use crate::query::StateQuery;

pub struct HealthAggregator {
    query_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(query_timeout: Duration) -> Self {
        Self { query_timeout }
    }

    /// Run all configured checks and collect the report.
    ///
    /// Desired-state resolution for every entity happens before any query
    /// is issued; an incomplete configuration aborts the whole run.
    pub async fn run(
        &self,
        config: &HealthConfig,
        query: &dyn StateQuery,
    ) -> Result<AggregateReport> {
        let entities = config.entities();

        let mut checks = Vec::with_capacity(entities.len());
        for entity in entities {
            let desired = DesiredStateResolver::resolve(&entity, config)?;
            checks.push((entity, desired));
        }

        if checks.is_empty() {
            info!("nothing to check");
            return Ok(AggregateReport::new(vec![CheckResult::note(
                "nothing to check",
            )]));
        }

        let pending = checks
            .iter()
            .map(|(entity, desired)| self.check_one(entity, desired, query));
        let results = future::join_all(pending).await;

        let report = AggregateReport::new(results);
        info!(
            checks = report.len(),
            overall = %report.overall(),
            "health run complete"
        );
        Ok(report)
    }

    async fn check_one(
        &self,
        entity: &Entity,
        desired: &DesiredState,
        query: &dyn StateQuery,
    ) -> CheckResult {
        let verdict = match tokio::time::timeout(self.query_timeout, query.fetch(entity)).await
        {
            Err(_) => {
                let err = QueryError::Timeout(self.query_timeout);
                warn!(entity = %entity, error = %err, "state query failed");
                Verdict::Unknown(err.to_string())
            }
            Ok(Err(err)) => {
                warn!(entity = %entity, error = %err, "state query failed");
                Verdict::Unknown(err.to_string())
            }
            Ok(Ok(observed)) => evaluate(&observed, desired),
        };

        let severity = severity_for(entity.kind, &verdict);
        let message = match &verdict {
            Verdict::Converged => "in desired state".to_string(),
            other => other.reason().unwrap_or_default().to_string(),
        };

        CheckResult {
            entity: Some(entity.clone()),
            verdict,
            severity,
            message,
        }
    }
}

/// Severity derived from verdict plus entity kind. Control-plane
/// unreachability is always Error. A diverged volume is recoverable
/// without impairing a running cluster, so it only warns.
fn severity_for(kind: EntityKind, verdict: &Verdict) -> Severity {
    match verdict {
        Verdict::Converged => Severity::Ok,
        Verdict::Unknown(_) => Severity::Error,
        Verdict::Diverged(_) => match kind {
            EntityKind::Volume => Severity::Warning,
            _ => Severity::Error,
        },
    }
}
