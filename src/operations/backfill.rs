use super::{
    ErrorCollator, Phase, RateTracker, COMPLETE_MSG, ERRORED_MSG, RATE_WINDOW, RECORD_BUFFER_SIZE,
};
use crate::aws::client::{Segment, TableClient, TableDescription};
use crate::config::OperationPlan;
use crate::error::SyncError;
use crate::status::buffer_status;
use crate::types::Item;
use crate::utils::format_duration;

use anyhow::anyhow;
use async_recursion::async_recursion;
use std::sync::{Arc, Mutex, Once};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const MAX_BATCH_SIZE: usize = 25;

/// Full-table copy from source to destination: a segmented parallel scan
/// feeds a bounded record channel drained by a fan-out of batch writers.
pub struct BackfillOperation {
    plan: OperationPlan,
    token: CancellationToken,

    input_client: Arc<dyn TableClient>,
    output_client: Arc<dyn TableClient>,

    // The sender is taken once by the scan driver; the channel closes when
    // the last scanner drops its clone, which is the writers' EOF.
    tx: Mutex<Option<mpsc::Sender<Item>>>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Item>>>,
    gauge: mpsc::WeakSender<Item>,

    begin_once: Once,

    scanning: Phase,
    writing: Phase,

    read_item_rate: RateTracker,
    rcu_rate: RateTracker,
    wcu_rate: RateTracker,
    written_item_rate: RateTracker,
}

impl BackfillOperation {
    pub fn new(
        plan: OperationPlan,
        token: CancellationToken,
        input_client: Arc<dyn TableClient>,
        output_client: Arc<dyn TableClient>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Item>(RECORD_BUFFER_SIZE);
        let gauge = tx.downgrade();

        Self {
            plan,
            token,
            input_client,
            output_client,
            tx: Mutex::new(Some(tx)),
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            gauge,
            begin_once: Once::new(),
            scanning: Phase::new(),
            writing: Phase::new(),
            read_item_rate: RateTracker::new("Read Items", RATE_WINDOW),
            rcu_rate: RateTracker::new("RCUs", RATE_WINDOW),
            wcu_rate: RateTracker::new("WCUs", RATE_WINDOW),
            written_item_rate: RateTracker::new("Written Items", RATE_WINDOW),
        }
    }

    pub fn preflight(
        &self,
        _input: &TableDescription,
        _output: &TableDescription,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    pub async fn run(self: Arc<Self>) -> Result<(), SyncError> {
        self.read_item_rate.start();
        self.rcu_rate.start();
        self.wcu_rate.start();
        self.written_item_rate.start();

        let mut collator = ErrorCollator::new(self.token.clone());
        let scan_op = Arc::clone(&self);
        collator.register(async move { scan_op.scan().await });
        let write_op = Arc::clone(&self);
        collator.register(async move { write_op.batch_write().await });

        let result = collator.run().await;

        self.read_item_rate.stop();
        self.rcu_rate.stop();
        self.wcu_rate.stop();
        self.written_item_rate.stop();

        result
    }

    pub fn status(&self) -> String {
        if self.writing.complete() {
            return COMPLETE_MSG.to_owned();
        }
        if self.errored() {
            return ERRORED_MSG.to_owned();
        }
        format!("{} written", self.written_item_rate.count())
    }

    pub fn rate(&self) -> String {
        if self.writing.running() {
            return format!(
                "{} {} {}",
                self.rcu_rate.rate_per_second(),
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
                "{}: Backfill in progress: {} items written over {}",
                self.plan.description(),
                self.written_item_rate.count(),
                format_duration(self.written_item_rate.duration()),
            );
        }
        String::new()
    }

    async fn scan(self: Arc<Self>) -> Result<(), SyncError> {
        self.scanning.start().ok();

        let Some(tx) = self
            .tx
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .take()
        else {
            return Err(SyncError::Other(anyhow!("backfill scan already started")));
        };

        let mut collator = ErrorCollator::new(self.token.clone());

        let total = self.plan.backfill.total_segments;
        if total > 0 {
            // Run the requested segment indexes, or all of them.
            let indexes: Vec<i32> = if self.plan.backfill.segments.is_empty() {
                (0..total).collect()
            } else {
                self.plan.backfill.segments.clone()
            };

            for index in indexes {
                let op = Arc::clone(&self);
                let tx = tx.clone();
                collator
                    .register(async move { op.scanner(tx, Some(Segment { index, total })).await });
            }
        } else {
            let op = Arc::clone(&self);
            let tx = tx.clone();
            collator.register(async move { op.scanner(tx, None).await });
        }

        drop(tx);

        match collator.run().await {
            Ok(()) => {
                info!(
                    "{}: Backfill: scan complete {} items read over {}",
                    self.plan.description(),
                    self.read_item_rate.count(),
                    format_duration(self.read_item_rate.duration()),
                );
                self.scanning.finish().ok();
                Ok(())
            }
            Err(SyncError::Cancelled) => Err(SyncError::Cancelled),
            Err(err) => {
                self.scanning.error();
                Err(SyncError::Other(anyhow!(
                    "{}: Backfill failed: (Scan) {err}",
                    self.plan.description()
                )))
            }
        }
    }

    async fn scanner(
        self: Arc<Self>,
        tx: mpsc::Sender<Item>,
        segment: Option<Segment>,
    ) -> Result<(), SyncError> {
        let table = self.plan.input.table_name.as_str();
        let mut start_key: Option<Item> = None;

        loop {
            let page = match self
                .token
                .run_until_cancelled(self.input_client.scan_page(table, segment, start_key.take()))
                .await
            {
                None => return Err(SyncError::Cancelled),
                Some(result) => result?,
            };

            self.rcu_rate.increment(page.consumed_capacity.ceil() as i64);

            for item in page.items {
                self.read_item_rate.increment(1);

                match self.token.run_until_cancelled(tx.send(item)).await {
                    None => return Err(SyncError::Cancelled),
                    Some(Ok(())) => {}
                    // The writers are gone, so cancellation is already in
                    // flight; report this scanner as cancelled.
                    Some(Err(_)) => return Err(SyncError::Cancelled),
                }
            }

            match page.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        Ok(())
    }

    async fn batch_write(self: Arc<Self>) -> Result<(), SyncError> {
        let mut collator = ErrorCollator::new(self.token.clone());

        let fan_out_width = num_cpus::get();
        for _ in 0..fan_out_width {
            let op = Arc::clone(&self);
            collator.register(async move { op.batch_writer().await });
        }

        match collator.run().await {
            Ok(()) => {
                info!(
                    "{}: Backfill complete: {} items written over {}",
                    self.plan.description(),
                    self.written_item_rate.count(),
                    format_duration(self.written_item_rate.duration()),
                );
                self.writing.finish().ok();
                Ok(())
            }
            Err(SyncError::Cancelled) => Err(SyncError::Cancelled),
            Err(err) => {
                self.writing.error();
                Err(SyncError::Other(anyhow!(
                    "{}: Backfill failed: (BatchWriteItem) {err}",
                    self.plan.description()
                )))
            }
        }
    }

    fn signal_backfill_start(&self) {
        self.begin_once.call_once(|| {
            self.writing.start().ok();
            info!("{}: Backfill started…", self.plan.description());
        });
    }

    async fn batch_writer(self: Arc<Self>) -> Result<(), SyncError> {
        let mut batch: Vec<Item> = Vec::with_capacity(MAX_BATCH_SIZE);

        loop {
            let received = {
                let mut rx = self.rx.lock().await;
                match self.token.run_until_cancelled(rx.recv()).await {
                    None => return Err(SyncError::Cancelled),
                    Some(received) => received,
                }
            };

            let Some(item) = received else { break };

            self.signal_backfill_start();

            batch.push(item);
            if batch.len() == MAX_BATCH_SIZE {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(MAX_BATCH_SIZE));
                self.send_batch(full).await?;
            }
        }

        if !batch.is_empty() {
            self.send_batch(batch).await?;
        }

        Ok(())
    }

    /// Issue one batch write, re-sending any unprocessed remainder until the
    /// destination accepts everything.
    #[async_recursion]
    async fn send_batch(&self, batch: Vec<Item>) -> Result<(), SyncError> {
        let batch_len = batch.len() as i64;
        let table = self.plan.output.table_name.as_str();

        let output = match self
            .token
            .run_until_cancelled(self.output_client.batch_put(table, batch))
            .await
        {
            None => return Err(SyncError::Cancelled),
            Some(result) => result?,
        };

        self.wcu_rate.increment(output.consumed_capacity.ceil() as i64);

        if !output.unprocessed.is_empty() {
            self.written_item_rate
                .increment(batch_len - output.unprocessed.len() as i64);
            return self.send_batch(output.unprocessed).await;
        }

        self.written_item_rate.increment(batch_len);
        Ok(())
    }

    fn buffer_fill(&self) -> usize {
        self.gauge
            .upgrade()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    fn errored(&self) -> bool {
        self.scanning.errored() || self.writing.errored()
    }
}
