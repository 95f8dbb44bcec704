use super::tree::{Shard, ShardTree};
use crate::aws::client::StreamsClient;
use crate::error::{aws_error_code, SyncError};
use crate::types::StreamStatus;

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const RESOURCE_NOT_FOUND_CODE: &str = "ResourceNotFoundException";

/// Consumes a single shard from trim horizon to exhaustion.
#[async_trait]
pub trait ShardProcessor: Send + Sync {
    async fn process(&self, shard: Shard) -> Result<(), SyncError>;
}

struct ShardOutcome {
    shard: Shard,
    result: Result<(), SyncError>,
}

/// Keep the first real failure; cancellations reported by draining workers
/// must not mask it.
fn record_error(slot: &mut Option<SyncError>, err: SyncError) {
    match slot {
        Some(existing) if !existing.is_cancelled() => {}
        _ => *slot = Some(err),
    }
}

/// Discovers stream shards and schedules workers over them. Each dispatch
/// cycle re-describes the stream, folds new shards into the tree and spawns
/// a worker per available shard; completing a shard may free its children,
/// which triggers the next cycle.
pub struct Watcher {
    token: CancellationToken,
    client: Arc<dyn StreamsClient>,
    table_name: String,
    description: String,

    tree: Mutex<ShardTree>,

    dispatched: AtomicI32,
    active: AtomicI32,
    started: AtomicBool,
}

impl Watcher {
    pub fn new(
        token: CancellationToken,
        client: Arc<dyn StreamsClient>,
        table_name: &str,
        description: &str,
    ) -> Self {
        Self {
            token,
            client,
            table_name: table_name.to_owned(),
            description: description.to_owned(),
            tree: Mutex::new(ShardTree::new()),
            dispatched: AtomicI32::new(0),
            active: AtomicI32::new(0),
            started: AtomicBool::new(false),
        }
    }

    /// Run dispatch cycles until cancellation or a fatal error. Every spawned
    /// worker is drained before this returns, even on the error path.
    pub async fn run_workers(
        &self,
        stream_arn: &str,
        processor: Arc<dyn ShardProcessor>,
    ) -> Result<(), SyncError> {
        self.started.store(true, Ordering::SeqCst);

        let (tx, mut rx) = mpsc::channel::<ShardOutcome>(64);

        self.dispatch_work(stream_arn, &processor, &tx).await?;

        let mut final_err: Option<SyncError> = None;
        loop {
            tokio::select! {
                outcome = rx.recv() => {
                    // The sender half is held locally, so the channel stays open.
                    let Some(outcome) = outcome else { break };
                    self.active.fetch_sub(1, Ordering::SeqCst);

                    match outcome.result {
                        Ok(()) => {
                            let completion = {
                                let mut tree = self.tree.lock().unwrap_or_else(|err| err.into_inner());
                                tree.shard_complete(&outcome.shard)
                            };
                            match completion {
                                Ok(()) => {
                                    self.log_shard_completion();
                                    if let Err(err) = self.dispatch_work(stream_arn, &processor, &tx).await {
                                        record_error(&mut final_err, err);
                                        self.token.cancel();
                                    }
                                }
                                Err(err) => {
                                    record_error(&mut final_err, SyncError::from(err));
                                    self.token.cancel();
                                }
                            }
                        }
                        Err(err) => {
                            record_error(&mut final_err, err.normalized());
                            self.token.cancel();
                        }
                    }
                }
                _ = self.token.cancelled(), if final_err.is_none() => {
                    final_err = Some(SyncError::Cancelled);
                }
            }

            if final_err.is_some() && self.active.load(Ordering::SeqCst) == 0 {
                break;
            }
        }

        match final_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn dispatched_count(&self) -> i32 {
        self.dispatched.load(Ordering::SeqCst)
    }

    pub fn shard_count(&self) -> usize {
        self.tree
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .len()
    }

    async fn dispatch_work(
        &self,
        stream_arn: &str,
        processor: &Arc<dyn ShardProcessor>,
        tx: &mpsc::Sender<ShardOutcome>,
    ) -> Result<(), SyncError> {
        self.update_shard_tree(stream_arn).await?;

        let available = {
            let mut tree = self.tree.lock().unwrap_or_else(|err| err.into_inner());
            tree.available_shards()
        };

        for shard in available {
            self.dispatched.fetch_add(1, Ordering::SeqCst);
            self.active.fetch_add(1, Ordering::SeqCst);

            let processor = Arc::clone(processor);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = processor.process(shard.clone()).await;
                let _ = tx.send(ShardOutcome { shard, result }).await;
            });
        }

        Ok(())
    }

    async fn update_shard_tree(&self, stream_arn: &str) -> Result<(), SyncError> {
        let description = match self
            .token
            .run_until_cancelled(self.client.describe_stream(stream_arn))
            .await
        {
            None => return Err(SyncError::Cancelled),
            Some(Ok(description)) => description,
            Some(Err(err)) => {
                if aws_error_code(&err) == Some(RESOURCE_NOT_FOUND_CODE) {
                    return Err(SyncError::Other(anyhow!(
                        "[{}] Error: Stream not found",
                        self.table_name
                    )));
                }
                return Err(SyncError::Other(err));
            }
        };

        if description.status != StreamStatus::Enabled {
            return Err(SyncError::Other(anyhow!(
                "[{}] Error: Stream not found",
                self.table_name
            )));
        }

        let mut tree = self.tree.lock().unwrap_or_else(|err| err.into_inner());
        tree.add(description.shards).map_err(SyncError::from)
    }

    fn log_shard_completion(&self) {
        info!(
            "{}: Shard complete. {}/{} dispatched.",
            self.description,
            self.dispatched_count(),
            self.shard_count()
        );
    }
}
