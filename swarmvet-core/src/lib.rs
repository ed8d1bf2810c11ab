//! Swarmvet core: cluster health evaluation and convergence verification
//!
//! Queries a set of distributed entities (nodes, services, networks,
//! volumes, connectivity probes) for their reported state, compares it
//! against caller-supplied desired state, and reduces the per-entity
//! verdicts to one deterministic report with a stable severity ordering
//! and exit-code mapping. After state-mutating operations (join, promote,
//! label update) the verifier re-polls with a bounded retry budget until
//! the entity converges or the budget runs out.

pub mod aggregate;
pub mod desired;
pub mod engine;
pub mod evaluate;
pub mod probe;
pub mod query;
pub mod report;
pub mod verify;

pub use aggregate::HealthAggregator;
pub use desired::{DesiredStateResolver, HealthConfig};
pub use engine::EngineClient;
pub use query::{ClusterQuery, StateQuery};
pub use report::{render, RenderedReport};
pub use verify::{JoinVerifier, VerifyOutcome};

use swarmvet_common::{AggregateReport, Result};

/// Run the full health pipeline against the given state query and render
/// the result. Configuration errors abort before any query is issued;
/// per-entity query failures are folded into the report.
pub async fn run_health_check(
    config: &HealthConfig,
    query: &dyn StateQuery,
) -> Result<(AggregateReport, RenderedReport)> {
    let aggregator = HealthAggregator::new(config.query_timeout());
    let report = aggregator.run(config, query).await?;
    let rendered = report::render(&report);
    Ok((report, rendered))
}
