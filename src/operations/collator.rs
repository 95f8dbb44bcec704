use crate::error::SyncError;

use anyhow::anyhow;
use std::future::Future;
use std::pin::Pin;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::error;

type Worker = Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send>>;

/// Runs a set of workers concurrently and collapses their outcomes into a
/// single result. Callers never see the individual failures, only the
/// canonical summary: success, `Cancelled`, or `OperationFailed`. The first
/// real failure fires the cancel token to stop the siblings; every worker is
/// joined before the collator returns.
pub struct ErrorCollator {
    workers: Vec<Worker>,
    cancel: Option<CancellationToken>,
}

impl ErrorCollator {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            workers: Vec::new(),
            cancel: Some(cancel),
        }
    }

    pub fn register<F>(&mut self, worker: F)
    where
        F: Future<Output = Result<(), SyncError>> + Send + 'static,
    {
        self.workers.push(Box::pin(worker));
    }

    pub async fn run(self) -> Result<(), SyncError> {
        let mut tasks = JoinSet::new();
        for worker in self.workers {
            tasks.spawn(worker);
        }

        let mut final_result: Result<(), SyncError> = Ok(());
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(result) => result.map_err(SyncError::normalized),
                Err(join_err) => Err(SyncError::Other(anyhow!(
                    "worker panicked: {join_err}"
                ))),
            };

            match outcome {
                Ok(()) => {}
                Err(SyncError::Cancelled) => {
                    if final_result.is_ok() {
                        final_result = Err(SyncError::Cancelled);
                    }
                }
                Err(err) => {
                    if let Some(cancel) = &self.cancel {
                        cancel.cancel();
                    }
                    if !matches!(err, SyncError::OperationFailed) {
                        error!("{err:#}");
                    }
                    final_result = Err(SyncError::OperationFailed);
                }
            }
        }

        final_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AwsApiError;

    #[tokio::test]
    async fn it_returns_ok_when_every_worker_succeeds() {
        let token = CancellationToken::new();
        let mut collator = ErrorCollator::new(token.clone());
        collator.register(async { Ok(()) });
        collator.register(async { Ok(()) });

        assert!(collator.run().await.is_ok());
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn it_reports_cancellation_without_firing_the_cancel_hook() {
        let token = CancellationToken::new();
        let mut collator = ErrorCollator::new(token.clone());
        collator.register(async { Ok(()) });
        collator.register(async { Err(SyncError::Cancelled) });

        let result = collator.run().await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn it_demotes_real_failures_and_cancels_siblings() {
        let token = CancellationToken::new();
        let sibling_token = token.clone();

        let mut collator = ErrorCollator::new(token.clone());
        collator.register(async move {
            sibling_token.cancelled().await;
            Err(SyncError::Cancelled)
        });
        collator.register(async { Err(SyncError::Other(anyhow!("socket torn down"))) });

        let result = collator.run().await;
        assert!(matches!(result, Err(SyncError::OperationFailed)));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn it_treats_request_canceled_codes_as_cancellation() {
        let token = CancellationToken::new();
        let mut collator = ErrorCollator::new(token.clone());
        collator.register(async { Ok(()) });
        collator.register(async {
            Err(SyncError::Other(anyhow::Error::new(AwsApiError::new(
                "RequestCanceled",
                "request canceled mid-flight",
            ))))
        });

        let result = collator.run().await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn it_keeps_operation_failed_over_late_cancellations() {
        let token = CancellationToken::new();
        let mut collator = ErrorCollator::new(token.clone());
        collator.register(async { Err(SyncError::Other(anyhow!("boom"))) });
        collator.register(async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Err(SyncError::Cancelled)
        });

        let result = collator.run().await;
        assert!(matches!(result, Err(SyncError::OperationFailed)));
    }
}
