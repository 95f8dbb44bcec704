use super::{BackfillOperation, DescribeOperation, StreamOperation};
use crate::aws;
use crate::aws::client::{StreamsClient, TableClient, TableDescription};
use crate::config::OperationPlan;
use crate::error::{aws_error_code, SyncError};
use crate::status::Status;
use crate::types::TableStatus;

use anyhow::anyhow;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

const RESOURCE_NOT_FOUND_CODE: &str = "ResourceNotFoundException";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorPhase {
    NotStarted,
    Backfill,
    Stream,
    Noop,
    Completed,
}

/// Coordinates one plan: the background describe loop plus the backfill and
/// stream sub-operations, run sequentially under a shared cancel token.
pub struct Operator {
    plan: OperationPlan,
    token: CancellationToken,

    phase: Mutex<OperatorPhase>,

    preflight_input: Arc<dyn TableClient>,
    preflight_output: Arc<dyn TableClient>,

    describe: Arc<DescribeOperation>,
    backfill: Option<Arc<BackfillOperation>>,
    stream: Option<Arc<StreamOperation>>,
}

impl Operator {
    pub async fn new(plan: OperationPlan, token: CancellationToken) -> Self {
        let input_table = aws::table_client(
            plan.input.region.as_str(),
            plan.input.role_arn.as_str(),
            aws::MAX_API_RETRIES,
        )
        .await;
        let output_table = aws::table_client(
            plan.output.region.as_str(),
            plan.output.role_arn.as_str(),
            aws::MAX_API_RETRIES,
        )
        .await;
        let input_streams = aws::streams_client(
            plan.input.region.as_str(),
            plan.input.role_arn.as_str(),
            aws::MAX_API_RETRIES,
        )
        .await;

        let preflight_input = aws::table_client(
            plan.input.region.as_str(),
            plan.input.role_arn.as_str(),
            aws::PREFLIGHT_RETRIES,
        )
        .await;
        let preflight_output = aws::table_client(
            plan.output.region.as_str(),
            plan.output.role_arn.as_str(),
            aws::PREFLIGHT_RETRIES,
        )
        .await;

        Self::with_clients(
            plan,
            token,
            input_table,
            output_table,
            input_streams,
            preflight_input,
            preflight_output,
        )
    }

    /// Assemble an operator around explicit clients. This is the seam the
    /// pipeline tests use to run against in-memory tables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_clients(
        plan: OperationPlan,
        token: CancellationToken,
        input_table: Arc<dyn TableClient>,
        output_table: Arc<dyn TableClient>,
        input_streams: Arc<dyn StreamsClient>,
        preflight_input: Arc<dyn TableClient>,
        preflight_output: Arc<dyn TableClient>,
    ) -> Self {
        let describe = Arc::new(DescribeOperation::new(
            plan.clone(),
            token.clone(),
            Arc::clone(&input_table),
        ));

        let backfill = (!plan.backfill.disabled).then(|| {
            Arc::new(BackfillOperation::new(
                plan.clone(),
                token.clone(),
                Arc::clone(&input_table),
                Arc::clone(&output_table),
            ))
        });

        let stream = (!plan.stream.disabled).then(|| {
            Arc::new(StreamOperation::new(
                plan.clone(),
                token.clone(),
                input_streams,
                Arc::clone(&output_table),
            ))
        });

        Self {
            plan,
            token,
            phase: Mutex::new(OperatorPhase::NotStarted),
            preflight_input,
            preflight_output,
            describe,
            backfill,
            stream,
        }
    }

    pub fn plan(&self) -> &OperationPlan {
        &self.plan
    }

    /// Both tables must exist and be `ACTIVE`; the sub-operations then check
    /// their own prerequisites.
    pub async fn preflight(&self) -> anyhow::Result<()> {
        let input_description = self
            .table_description(&self.preflight_input, self.plan.input.table_name.as_str())
            .await?;
        let output_description = self
            .table_description(&self.preflight_output, self.plan.output.table_name.as_str())
            .await?;

        if let Some(backfill) = &self.backfill {
            backfill.preflight(&input_description, &output_description)?;
        }
        if let Some(stream) = &self.stream {
            stream.preflight(&input_description)?;
        }
        Ok(())
    }

    pub async fn run(self: Arc<Self>) -> Result<(), SyncError> {
        let describe = Arc::clone(&self.describe);
        let describe_handle = tokio::spawn(async move { describe.run().await });

        let result = self.run_phases().await;

        self.describe.stop();
        let _ = describe_handle.await;

        result
    }

    pub fn status(&self) -> Status {
        let mut status = Status::new(self.plan.output.table_name.as_str());
        status.description = self.describe.status();

        if let Some(backfill) = &self.backfill {
            status.backfill = backfill.status();
        }
        if let Some(stream) = &self.stream {
            status.stream = stream.status();
        }

        match self.phase() {
            OperatorPhase::NotStarted => status.set_waiting(),
            OperatorPhase::Backfill => {
                if let Some(backfill) = &self.backfill {
                    status.rate = backfill.rate();
                }
            }
            OperatorPhase::Stream => {
                if let Some(stream) = &self.stream {
                    status.rate = stream.rate();
                }
            }
            OperatorPhase::Noop => status.set_noop(),
            OperatorPhase::Completed => {}
        }

        status
    }

    /// Non-empty progress lines from the running sub-operations.
    pub fn checkpoint(&self) -> String {
        let mut lines = Vec::new();

        if let Some(backfill) = &self.backfill {
            let line = backfill.checkpoint();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        if let Some(stream) = &self.stream {
            let line = stream.checkpoint();
            if !line.is_empty() {
                lines.push(line);
            }
        }

        lines.join("\n")
    }

    pub fn phase(&self) -> OperatorPhase {
        *self.phase.lock().unwrap_or_else(|err| err.into_inner())
    }

    async fn run_phases(&self) -> Result<(), SyncError> {
        if let Some(backfill) = &self.backfill {
            self.set_phase(OperatorPhase::Backfill);
            Arc::clone(backfill).run().await?;
        }

        if let Some(stream) = &self.stream {
            self.set_phase(OperatorPhase::Stream);
            Arc::clone(stream).run().await?;
        }

        if self.backfill.is_none() && self.stream.is_none() {
            self.set_phase(OperatorPhase::Noop);
        } else {
            self.set_phase(OperatorPhase::Completed);
        }

        Ok(())
    }

    fn set_phase(&self, phase: OperatorPhase) {
        *self.phase.lock().unwrap_or_else(|err| err.into_inner()) = phase;
    }

    async fn table_description(
        &self,
        client: &Arc<dyn TableClient>,
        table: &str,
    ) -> anyhow::Result<TableDescription> {
        let description = match self
            .token
            .run_until_cancelled(client.describe_table(table))
            .await
        {
            None => anyhow::bail!("[{table}] describe table canceled"),
            Some(Ok(description)) => description,
            Some(Err(err)) => {
                if aws_error_code(&err) == Some(RESOURCE_NOT_FOUND_CODE) {
                    anyhow::bail!("[{table}] Failed pre-flight check: table does not exist");
                }
                return Err(anyhow!(
                    "[{table}] describe table operation failed with {err:#}"
                ));
            }
        };

        if description.status != TableStatus::Active {
            anyhow::bail!("[{table}] Fails pre-flight check: table status is not active");
        }

        Ok(description)
    }
}
