use super::{
    ErrorCollator, LatencyLock, Phase, RateTracker, PENDING_MSG, RATE_WINDOW, RECORD_BUFFER_SIZE,
};
use crate::aws::client::{StreamsClient, TableClient, TableDescription};
use crate::config::OperationPlan;
use crate::error::SyncError;
use crate::shards::{Shard, ShardProcessor, Watcher};
use crate::status::buffer_status;
use crate::types::{StreamEvent, StreamRecord};
use crate::utils::format_duration;

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

// Enough consecutive empty polls to move on from a blank shard without
// backing off prematurely on a merely quiet one.
const BLANK_COUNT_THRESHOLD: u32 = 5;

const BACKOFF_DURATION: Duration = Duration::from_secs(3);

/// Tails the source table's change stream and applies each mutation to the
/// destination: the shard watcher fans records into a bounded channel, and a
/// single writer replays them in order.
pub struct StreamOperation {
    plan: OperationPlan,
    token: CancellationToken,

    input_client: Arc<dyn StreamsClient>,
    output_client: Arc<dyn TableClient>,

    write_latency: LatencyLock,

    tx: Mutex<Option<mpsc::Sender<StreamRecord>>>,
    rx: Mutex<Option<mpsc::Receiver<StreamRecord>>>,
    gauge: mpsc::WeakSender<StreamRecord>,

    stream_arn: Mutex<Option<String>>,

    stream_read: Phase,
    writing: Phase,

    watcher: Watcher,

    read_item_rate: RateTracker,
    wcu_rate: RateTracker,
    written_item_rate: RateTracker,
}

impl StreamOperation {
    pub fn new(
        plan: OperationPlan,
        token: CancellationToken,
        input_client: Arc<dyn StreamsClient>,
        output_client: Arc<dyn TableClient>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<StreamRecord>(RECORD_BUFFER_SIZE);
        let gauge = tx.downgrade();

        let watcher = Watcher::new(
            token.clone(),
            Arc::clone(&input_client),
            plan.input.table_name.as_str(),
            plan.description().as_str(),
        );

        Self {
            plan,
            token,
            input_client,
            output_client,
            write_latency: LatencyLock::default(),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
            gauge,
            stream_arn: Mutex::new(None),
            stream_read: Phase::new(),
            writing: Phase::new(),
            watcher,
            read_item_rate: RateTracker::new("Items", RATE_WINDOW),
            wcu_rate: RateTracker::new("WCUs", RATE_WINDOW),
            written_item_rate: RateTracker::new("Items", RATE_WINDOW),
        }
    }

    /// The source table must have streaming enabled with a view type that
    /// carries new images; captures the stream ARN for the watcher.
    pub fn preflight(&self, input: &TableDescription) -> anyhow::Result<()> {
        let table = input.table_name.as_str();

        let Some(spec) = &input.stream else {
            anyhow::bail!("[{table}] Fails pre-flight check: stream is not enabled");
        };
        if !spec.enabled {
            anyhow::bail!("[{table}] Fails pre-flight check: stream is not enabled");
        }
        if !spec.view_type.has_new_image() {
            anyhow::bail!(
                "[{table}] Fails pre-flight check: stream is not a correct type 'NEW_IMAGE' or 'NEW_AND_OLD_IMAGES'"
            );
        }
        let Some(arn) = &spec.arn else {
            anyhow::bail!("[{table}] Fails pre-flight check: stream is not enabled");
        };

        *self
            .stream_arn
            .lock()
            .unwrap_or_else(|err| err.into_inner()) = Some(arn.clone());
        Ok(())
    }

    pub async fn run(self: Arc<Self>) -> Result<(), SyncError> {
        self.read_item_rate.start();
        self.wcu_rate.start();
        self.written_item_rate.start();

        let mut collator = ErrorCollator::new(self.token.clone());
        let read_op = Arc::clone(&self);
        collator.register(async move { read_op.read_stream().await });
        let write_op = Arc::clone(&self);
        collator.register(async move { write_op.write_records().await });

        let result = collator.run().await;

        self.read_item_rate.stop();
        self.wcu_rate.stop();
        self.written_item_rate.stop();

        result
    }

    pub fn status(&self) -> String {
        if !self.watcher.started() {
            return PENDING_MSG.to_owned();
        }

        format!(
            "{} written ({} latent)",
            self.written_item_rate.count(),
            self.write_latency.status(),
        )
    }

    pub fn rate(&self) -> String {
        if self.writing.running() {
            return format!(
                "{} {} {}",
                self.read_item_rate.rate_per_second(),
                buffer_status(self.buffer_fill(), RECORD_BUFFER_SIZE),
                self.wcu_rate.rate_per_second(),
            );
        }
        String::new()
    }

    /// One logging line summarizing progress, for the periodic checkpoint.
    pub fn checkpoint(&self) -> String {
        if self.writing.running() {
            return format!(
                "{}: Streaming: {} items written over {}",
                self.plan.description(),
                self.written_item_rate.count(),
                format_duration(self.written_item_rate.duration()),
            );
        }
        String::new()
    }

    async fn read_stream(self: Arc<Self>) -> Result<(), SyncError> {
        info!("{}: Streaming started…", self.plan.description());
        self.stream_read.start().ok();

        let Some(tx) = self
            .tx
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .take()
        else {
            return Err(SyncError::Other(anyhow!("stream read already started")));
        };

        let arn = self
            .stream_arn
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone();
        let Some(arn) = arn else {
            return Err(SyncError::Other(anyhow!("stream preflight has not run")));
        };

        let processor: Arc<dyn ShardProcessor> = Arc::new(ShardPump {
            operation: Arc::clone(&self),
            tx,
        });

        match self.watcher.run_workers(arn.as_str(), processor).await {
            Ok(()) => {
                info!(
                    "{}: Stream closed: {} items written over {}",
                    self.plan.description(),
                    self.written_item_rate.count(),
                    format_duration(self.written_item_rate.duration()),
                );
                self.stream_read.finish().ok();
                Ok(())
            }
            Err(err) => {
                self.stream_read.error();
                Err(err)
            }
        }
    }

    /// Walk one shard from trim horizon until its iterator runs out. Quiet
    /// shards back off between polls; any records reset the backoff.
    async fn process_shard(
        &self,
        tx: &mpsc::Sender<StreamRecord>,
        shard: &Shard,
    ) -> Result<(), SyncError> {
        let arn = self
            .stream_arn
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone();
        let Some(arn) = arn else {
            return Err(SyncError::Other(anyhow!("stream preflight has not run")));
        };

        let mut iterator = match self
            .token
            .run_until_cancelled(self.input_client.get_shard_iterator(arn.as_str(), shard.id()))
            .await
        {
            None => return Err(SyncError::Cancelled),
            Some(result) => result?,
        };

        let mut blank_count: u32 = 0;

        while let Some(current) = iterator.take().filter(|iterator| !iterator.is_empty()) {
            let output = match self
                .token
                .run_until_cancelled(self.input_client.get_records(current.as_str()))
                .await
            {
                None => return Err(SyncError::Cancelled),
                Some(result) => result?,
            };

            if output.records.is_empty() {
                blank_count += 1;
            } else {
                blank_count = 0;
            }

            if blank_count > BLANK_COUNT_THRESHOLD {
                tokio::select! {
                    _ = tokio::time::sleep(BACKOFF_DURATION) => {}
                    _ = self.token.cancelled() => return Err(SyncError::Cancelled),
                }
            }

            for record in output.records {
                self.read_item_rate.increment(1);

                match self.token.run_until_cancelled(tx.send(record)).await {
                    None => return Err(SyncError::Cancelled),
                    Some(Ok(())) => {}
                    // The writer is gone; cancellation is already in flight.
                    Some(Err(_)) => return Err(SyncError::Cancelled),
                }
            }

            iterator = output.next_iterator;
        }

        Ok(())
    }

    async fn write_records(self: Arc<Self>) -> Result<(), SyncError> {
        self.writing.start().ok();

        let Some(mut rx) = self
            .rx
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .take()
        else {
            return Err(SyncError::Other(anyhow!("stream writer already started")));
        };

        loop {
            let record = match self.token.run_until_cancelled(rx.recv()).await {
                None => return Err(SyncError::Cancelled),
                Some(None) => break,
                Some(Some(record)) => record,
            };

            if let Some(created) = record.approximate_creation() {
                self.write_latency.update(created);
            }

            let table = self.plan.output.table_name.as_str();
            let write = match record.event() {
                StreamEvent::Remove => {
                    self.token
                        .run_until_cancelled(self.output_client.delete_item(table, record.into_keys()))
                        .await
                }
                _ => {
                    self.token
                        .run_until_cancelled(self.output_client.put_item(table, record.into_new_image()))
                        .await
                }
            };

            let consumed = match write {
                None => return Err(SyncError::Cancelled),
                Some(Ok(consumed)) => consumed,
                Some(Err(err)) => {
                    self.writing.error();
                    return Err(SyncError::Other(anyhow!(
                        "{}: Stream failed: (WriteRecords) {err}",
                        self.plan.description()
                    )));
                }
            };

            self.mark_item_written(consumed);
        }

        self.writing.finish().ok();
        Ok(())
    }

    fn mark_item_written(&self, consumed_capacity: f64) {
        self.written_item_rate.increment(1);
        self.wcu_rate.increment(consumed_capacity.ceil() as i64);
    }

    fn buffer_fill(&self) -> usize {
        self.gauge
            .upgrade()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }
}

struct ShardPump {
    operation: Arc<StreamOperation>,
    tx: mpsc::Sender<StreamRecord>,
}

#[async_trait]
impl ShardProcessor for ShardPump {
    async fn process(&self, shard: Shard) -> Result<(), SyncError> {
        self.operation.process_shard(&self.tx, &shard).await
    }
}
