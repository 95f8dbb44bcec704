use super::{Phase, ERRORED_MSG};
use crate::aws::client::TableClient;
use crate::config::OperationPlan;
use crate::logger::approximate;
use crate::utils::format_bytes;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const TICK_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Background loop refreshing the source table's approximate item and byte
/// counts for the status display. Failures are logged and flagged but never
/// fail the operation.
pub struct DescribeOperation {
    plan: OperationPlan,
    token: CancellationToken,
    stop: CancellationToken,

    client: Arc<dyn TableClient>,

    describing: Phase,

    approximate_item_count: AtomicI64,
    approximate_size_bytes: AtomicI64,
}

impl DescribeOperation {
    pub fn new(plan: OperationPlan, token: CancellationToken, client: Arc<dyn TableClient>) -> Self {
        Self {
            plan,
            token,
            stop: CancellationToken::new(),
            client,
            describing: Phase::new(),
            approximate_item_count: AtomicI64::new(0),
            approximate_size_bytes: AtomicI64::new(0),
        }
    }

    /// Describe immediately, then every fifteen minutes until stopped.
    pub async fn run(&self) {
        self.describing.start().ok();

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = self.stop.cancelled() => break,
                _ = ticker.tick() => self.describe().await,
            }
        }
    }

    pub fn stop(&self) {
        self.describing.finish().ok();
        self.stop.cancel();
    }

    pub fn status(&self) -> String {
        if self.describing.errored() {
            return ERRORED_MSG.to_owned();
        }

        format!(
            "{} items (~{})",
            approximate(self.approximate_item_count.load(Ordering::SeqCst)),
            format_bytes(self.approximate_size_bytes.load(Ordering::SeqCst)),
        )
    }

    async fn describe(&self) {
        match self
            .client
            .describe_table(self.plan.input.table_name.as_str())
            .await
        {
            Ok(description) => {
                self.approximate_item_count
                    .store(description.item_count, Ordering::SeqCst);
                self.approximate_size_bytes
                    .store(description.size_bytes, Ordering::SeqCst);
            }
            Err(err) => {
                warn!(
                    "{}: failed to refresh the table description: {err:#}",
                    self.plan.description()
                );
                self.describing.error();
            }
        }
    }
}
