use crate::aws;
use crate::config::OperationPlan;
use crate::error::SyncError;
use crate::operations::{ErrorCollator, Operator};
use crate::status::Set;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const CHECKPOINT_HEADER: &str = "================= Progress Update ==================";
const CHECKPOINT_FOOTER: &str = "====================================================";

/// Process-level owner of every operator and the shared cancellation token.
pub struct Dispatcher {
    operators: Vec<Arc<Operator>>,
    token: CancellationToken,
}

impl Dispatcher {
    /// Validate each plan and build its operator. All plans are checked
    /// before giving up so the user sees every configuration problem at once.
    pub async fn new(plans: Vec<OperationPlan>) -> anyhow::Result<Dispatcher> {
        let token = CancellationToken::new();

        let mut operators = Vec::new();
        let mut invalid = 0usize;
        for plan in plans {
            let plan = plan.with_defaults();
            if let Err(err) = plan.validate() {
                error!("{}: {err}", plan.description());
                invalid += 1;
                continue;
            }

            operators.push(Arc::new(Operator::new(plan, token.clone()).await));
        }

        if invalid > 0 {
            anyhow::bail!("{invalid} operation plan(s) failed validation");
        }

        Ok(Self { operators, token })
    }

    /// Quick credential probe, then every operator's preflight. Individual
    /// failures are logged and folded into one composite error.
    pub async fn preflights(&self) -> anyhow::Result<()> {
        if let Err(err) = aws::check_credentials().await {
            error!("No valid credentials found");
            return Err(err);
        }

        let mut failed = 0usize;
        for operator in &self.operators {
            if let Err(err) = operator.preflight().await {
                error!("{err:#}");
                failed += 1;
            }
        }

        if failed > 0 {
            anyhow::bail!("{failed} operation(s) failed pre-flight checks");
        }
        Ok(())
    }

    pub async fn run(&self) -> Result<(), SyncError> {
        let mut collator = ErrorCollator::new(self.token.clone());
        for operator in &self.operators {
            let operator = Arc::clone(operator);
            collator.register(async move { operator.run().await });
        }
        collator.run().await
    }

    /// Log a progress-update block with one line per active sub-operation.
    pub fn checkpoint(&self) {
        let mut lines = vec![String::new(), CHECKPOINT_HEADER.to_owned()];
        for operator in &self.operators {
            let line = operator.checkpoint();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines.push(CHECKPOINT_FOOTER.to_owned());

        info!("{}", lines.join("\n"));
    }

    pub fn statuses(&self) -> Set {
        Set::new(
            self.operators
                .iter()
                .map(|operator| operator.status())
                .collect(),
        )
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}
