use super::OperationPlan;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::Read;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanConfig {
    plan: Vec<OperationPlan>,
}

/// Read replication plans from a YAML file. Unknown fields are rejected so a
/// typo cannot silently disable part of a plan. A path of "-" reads from
/// standard input.
pub fn parse_config_file(path: &str) -> Result<Vec<OperationPlan>> {
    let content = if path == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read configuration from stdin")?;
        buffer
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to open configuration file: {path}"))?
    };

    let config: PlanConfig =
        serde_yaml::from_str(&content).context("Failed to parse configuration file")?;
    Ok(config.plan)
}
