mod file;

pub use file::parse_config_file;

use serde::Deserialize;
use std::env;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    #[error("input region is required")]
    InputRegionRequired,
    #[error("input table name is required")]
    InputTableRequired,
    #[error("output region is required")]
    OutputRegionRequired,
    #[error("output table name is required")]
    OutputTableRequired,
    #[error("input and output tables cannot match")]
    InputAndOutputTablesCannotMatch,
    #[error("backfill segment configuration is invalid")]
    BackfillSegmentConfiguration,
    #[error("backfill total segments configuration is invalid")]
    BackfillTotalSegmentsConfiguration,
    #[error("stream must be disabled if scan segment targets are specified")]
    StreamCannotRunWithSegmentedScan,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Input {
    pub region: String,
    #[serde(rename = "table")]
    pub table_name: String,
    pub role_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Output {
    /// Defaults to the input region.
    pub region: String,
    /// Defaults to the input table name.
    #[serde(rename = "table")]
    pub table_name: String,
    pub role_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Backfill {
    pub disabled: bool,
    pub segments: Vec<i32>,
    pub total_segments: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Stream {
    pub disabled: bool,
}

/// Immutable configuration for one replication operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationPlan {
    pub input: Input,
    pub output: Output,
    pub backfill: Backfill,
    pub stream: Stream,
}

impl OperationPlan {
    /// Fill the destination side from the source side where unspecified.
    pub fn with_defaults(mut self) -> Self {
        if self.output.table_name.is_empty() {
            self.output.table_name = self.input.table_name.clone();
        }
        if self.output.region.is_empty() {
            self.output.region = self.input.region.clone();
        }
        self
    }

    /// "[input-table] ⇨ [output-table]", used as the log prefix.
    pub fn description(&self) -> String {
        format!("[{}] ⇨ [{}]", self.input.table_name, self.output.table_name)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        self.validate_with_default_region(ambient_region().as_deref())
    }

    fn validate_with_default_region(&self, default_region: Option<&str>) -> Result<(), PlanError> {
        let has_default = default_region.is_some_and(|region| !region.is_empty());

        if self.input.region.is_empty() && !has_default {
            return Err(PlanError::InputRegionRequired);
        }
        if self.input.table_name.is_empty() {
            return Err(PlanError::InputTableRequired);
        }

        if self.output.region.is_empty() && !has_default {
            return Err(PlanError::OutputRegionRequired);
        }
        if self.output.table_name.is_empty() {
            return Err(PlanError::OutputTableRequired);
        }

        self.validate_backfill_segments()?;

        if self.input.region == self.output.region
            && self.input.table_name == self.output.table_name
            && self.input.role_arn == self.output.role_arn
        {
            return Err(PlanError::InputAndOutputTablesCannotMatch);
        }

        Ok(())
    }

    fn validate_backfill_segments(&self) -> Result<(), PlanError> {
        if self.backfill.disabled {
            return Ok(());
        }

        if self.backfill.total_segments == 0 {
            // Segment targets are meaningless without a segment count.
            if self.backfill.segments.is_empty() {
                return Ok(());
            }
            return Err(PlanError::BackfillTotalSegmentsConfiguration);
        }

        if self.backfill.total_segments < 1 {
            return Err(PlanError::BackfillTotalSegmentsConfiguration);
        }

        if self.backfill.segments.is_empty() {
            return Ok(());
        }

        let out_of_range = self
            .backfill
            .segments
            .iter()
            .any(|&segment| segment < 0 || segment >= self.backfill.total_segments);
        if out_of_range {
            return Err(PlanError::BackfillSegmentConfiguration);
        }

        // A segmented scan covers only part of the table, so following the
        // stream afterwards cannot keep per-key ordering consistent.
        if !self.stream.disabled {
            return Err(PlanError::StreamCannotRunWithSegmentedScan);
        }

        Ok(())
    }
}

fn ambient_region() -> Option<String> {
    env::var("AWS_REGION")
        .or_else(|_| env::var("AWS_DEFAULT_REGION"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_plan() -> OperationPlan {
        OperationPlan {
            input: Input {
                region: "us-west-2".into(),
                table_name: "users".into(),
                role_arn: String::new(),
            },
            output: Output {
                region: "us-east-1".into(),
                table_name: "users-replica".into(),
                role_arn: String::new(),
            },
            ..OperationPlan::default()
        }
        .with_defaults()
    }

    #[test]
    fn it_accepts_a_complete_plan() {
        assert_eq!(valid_plan().validate_with_default_region(None), Ok(()));
    }

    #[test]
    fn it_requires_an_input_region_without_an_ambient_default() {
        let mut plan = valid_plan();
        plan.input.region = String::new();
        assert_eq!(
            plan.validate_with_default_region(None),
            Err(PlanError::InputRegionRequired)
        );
    }

    #[test]
    fn it_accepts_a_missing_region_when_the_environment_provides_one() {
        let mut plan = valid_plan();
        plan.input.region = String::new();
        assert_eq!(plan.validate_with_default_region(Some("eu-west-1")), Ok(()));
    }

    #[test]
    fn it_requires_an_input_table() {
        let mut plan = valid_plan();
        plan.input.table_name = String::new();
        assert_eq!(
            plan.validate_with_default_region(None),
            Err(PlanError::InputTableRequired)
        );
    }

    #[test]
    fn it_rejects_identical_input_and_output() {
        let plan = OperationPlan {
            input: Input {
                region: "us-west-2".into(),
                table_name: "users".into(),
                role_arn: String::new(),
            },
            ..OperationPlan::default()
        }
        .with_defaults();

        assert_eq!(
            plan.validate_with_default_region(None),
            Err(PlanError::InputAndOutputTablesCannotMatch)
        );
    }

    #[test]
    fn it_allows_same_table_names_across_regions() {
        let mut plan = valid_plan();
        plan.output.table_name = plan.input.table_name.clone();
        assert_eq!(plan.validate_with_default_region(None), Ok(()));
    }

    #[test]
    fn it_rejects_segments_at_or_beyond_the_total() {
        let mut plan = valid_plan();
        plan.backfill.segments = vec![3];
        plan.backfill.total_segments = 3;
        plan.stream.disabled = true;
        assert_eq!(
            plan.validate_with_default_region(None),
            Err(PlanError::BackfillSegmentConfiguration)
        );
    }

    #[test]
    fn it_rejects_negative_segments() {
        let mut plan = valid_plan();
        plan.backfill.segments = vec![-1];
        plan.backfill.total_segments = 3;
        plan.stream.disabled = true;
        assert_eq!(
            plan.validate_with_default_region(None),
            Err(PlanError::BackfillSegmentConfiguration)
        );
    }

    #[test]
    fn it_requires_the_stream_disabled_for_a_segmented_scan() {
        let mut plan = valid_plan();
        plan.backfill.segments = vec![0, 1, 2];
        plan.backfill.total_segments = 3;
        plan.stream.disabled = false;
        assert_eq!(
            plan.validate_with_default_region(None),
            Err(PlanError::StreamCannotRunWithSegmentedScan)
        );
    }

    #[test]
    fn it_allows_a_segmented_scan_with_the_stream_disabled() {
        let mut plan = valid_plan();
        plan.backfill.segments = vec![0, 1, 2];
        plan.backfill.total_segments = 3;
        plan.stream.disabled = true;
        assert_eq!(plan.validate_with_default_region(None), Ok(()));
    }

    #[test]
    fn it_defaults_the_output_side_from_the_input() {
        let plan = OperationPlan {
            input: Input {
                region: "us-west-2".into(),
                table_name: "users".into(),
                role_arn: String::new(),
            },
            ..OperationPlan::default()
        }
        .with_defaults();

        assert_eq!(plan.output.region, "us-west-2");
        assert_eq!(plan.output.table_name, "users");
    }

    #[test]
    fn it_describes_the_operation_by_its_tables() {
        assert_eq!(valid_plan().description(), "[users] ⇨ [users-replica]");
    }
}
