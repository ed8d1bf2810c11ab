use anyhow::Result;
use swarmvet_core::{run_health_check, ClusterQuery, HealthConfig};

use crate::output::{self, OutputFormat};

pub async fn handle_check_command(config: &HealthConfig, format: OutputFormat) -> Result<i32> {
    let query = ClusterQuery::from_config(config);
    let (report, rendered) = run_health_check(config, &query).await?;

    output::print_report(&report, &rendered, format)?;
    Ok(rendered.exit_code)
}
