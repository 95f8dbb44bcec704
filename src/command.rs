use crate::config::{self, Backfill, Input, OperationPlan, Output, Stream};

use anyhow::anyhow;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    /// Help or version output was requested; not a failure.
    #[error("exit requested")]
    Exit,
    #[error(transparent)]
    Usage(#[from] anyhow::Error),
}

#[derive(Debug, Parser)]
#[command(
    name = "dynamo-sync",
    about = "Replicate DynamoDB tables: parallel backfill plus change-stream follow",
    disable_version_flag = true
)]
struct Cli {
    /// Filename for configuration yaml ("-" reads standard input)
    #[arg(long = "config-file")]
    config_file: Option<String>,

    /// The input region
    #[arg(long = "input-region")]
    input_region: Option<String>,

    /// Name of the input table
    #[arg(long = "input-table")]
    input_table: Option<String>,

    /// ARN of the input role
    #[arg(long = "input-role-arn")]
    input_role_arn: Option<String>,

    /// The output region
    #[arg(long = "output-region")]
    output_region: Option<String>,

    /// Name of the output table
    #[arg(long = "output-table")]
    output_table: Option<String>,

    /// ARN of the output role
    #[arg(long = "output-role-arn")]
    output_role_arn: Option<String>,

    /// Backfill scan segment(s) to target, 0-indexed, e.g. "0,1,2".
    /// Prohibits streaming and requires --backfill-total-segments.
    #[arg(long = "backfill-segments", value_delimiter = ',')]
    backfill_segments: Option<Vec<i32>>,

    /// Backfill 'Scan' concurrency segments
    #[arg(long = "backfill-total-segments")]
    backfill_total_segments: Option<i32>,

    /// Perform the backfill operation
    #[arg(
        long = "backfill",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    backfill: bool,

    /// Perform the streaming operation
    #[arg(
        long = "stream",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    stream: bool,
}

/// Turn command-line arguments into replication plans: either the plan list
/// from a config file, or a single plan assembled from flags.
pub fn parse_args(args: &[String]) -> Result<Vec<OperationPlan>, CommandError> {
    if args.is_empty() {
        let _ = Cli::command().print_help();
        return Err(CommandError::Usage(anyhow!("improper usage")));
    }

    let cli = match Cli::try_parse_from(
        std::iter::once("dynamo-sync".to_owned()).chain(args.iter().cloned()),
    ) {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return Err(CommandError::Exit);
        }
        Err(err) => {
            let _ = err.print();
            return Err(CommandError::Usage(anyhow!("improper usage")));
        }
    };

    if let Some(path) = cli.config_file.as_deref() {
        return config::parse_config_file(path).map_err(CommandError::Usage);
    }

    if cli.backfill_segments.is_some() && cli.backfill_total_segments.is_none() {
        return Err(CommandError::Usage(anyhow!(
            "to specify \"backfill-segments\" you must configure \"backfill-total-segments\""
        )));
    }

    let plan = OperationPlan {
        input: Input {
            region: cli.input_region.unwrap_or_default(),
            table_name: cli.input_table.unwrap_or_default(),
            role_arn: cli.input_role_arn.unwrap_or_default(),
        },
        output: Output {
            region: cli.output_region.unwrap_or_default(),
            table_name: cli.output_table.unwrap_or_default(),
            role_arn: cli.output_role_arn.unwrap_or_default(),
        },
        backfill: Backfill {
            disabled: !cli.backfill,
            segments: cli.backfill_segments.unwrap_or_default(),
            total_segments: cli.backfill_total_segments.unwrap_or_default(),
        },
        stream: Stream {
            disabled: !cli.stream,
        },
    };

    Ok(vec![plan])
}
