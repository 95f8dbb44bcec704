//! In-memory stand-ins for the DynamoDB clients, used by pipeline tests.

use super::{
    BatchWriteOutput, GetRecordsOutput, ScanPage, Segment, StreamDescription, StreamsClient,
    TableClient, TableDescription,
};
use crate::error::AwsApiError;
use crate::shards::Shard;
use crate::types::{Item, StreamRecord, StreamStatus, TableStatus};

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const CURSOR_ATTR: &str = "__cursor";

/// A table client backed by in-memory segment data and a keyed store.
/// Scans read the configured segments; writes land in the store so tests can
/// assert on the final destination state.
#[derive(Debug, Default)]
pub struct MockTableClient {
    description: Option<TableDescription>,
    segments: Mutex<HashMap<i32, Vec<Item>>>,
    page_size: usize,
    key_attr: String,
    store: Mutex<BTreeMap<String, Item>>,
    unprocessed_rounds: AtomicU32,
    batch_error: Mutex<Option<String>>,
    batch_calls: AtomicU32,
    put_log: Mutex<Vec<String>>,
    delete_log: Mutex<Vec<String>>,
}

impl MockTableClient {
    pub fn new() -> Self {
        Self {
            page_size: 10,
            key_attr: "pk".into(),
            ..Self::default()
        }
    }

    pub fn set_description(mut self, description: TableDescription) -> Self {
        self.description = Some(description);
        self
    }

    pub fn set_segment(self, index: i32, items: Vec<Item>) -> Self {
        self.segments
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .insert(index, items);
        self
    }

    pub fn set_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn set_key_attr<T: Into<String>>(mut self, key_attr: T) -> Self {
        self.key_attr = key_attr.into();
        self
    }

    /// The first `rounds` batch calls return their final item as unprocessed.
    pub fn set_unprocessed_rounds(self, rounds: u32) -> Self {
        self.unprocessed_rounds.store(rounds, Ordering::SeqCst);
        self
    }

    /// Every batch call fails with the given AWS error code.
    pub fn set_batch_error<T: Into<String>>(self, code: T) -> Self {
        *self
            .batch_error
            .lock()
            .unwrap_or_else(|err| err.into_inner()) = Some(code.into());
        self
    }

    pub fn stored_keys(&self) -> Vec<String> {
        self.store
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn stored_len(&self) -> usize {
        self.store
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.store
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .contains_key(key)
    }

    pub fn put_count(&self) -> usize {
        self.put_log
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .len()
    }

    pub fn delete_count(&self) -> usize {
        self.delete_log
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .len()
    }

    pub fn batch_calls(&self) -> u32 {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn render_key(&self, item: &Item) -> String {
        match item.get(self.key_attr.as_str()) {
            Some(AttributeValue::S(value)) => value.clone(),
            Some(AttributeValue::N(value)) => value.clone(),
            Some(other) => format!("{other:?}"),
            None => String::new(),
        }
    }

    fn apply_put(&self, item: Item) {
        let key = self.render_key(&item);
        self.put_log
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(key.clone());
        self.store
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .insert(key, item);
    }
}

#[async_trait]
impl TableClient for MockTableClient {
    async fn describe_table(&self, table: &str) -> Result<TableDescription> {
        match &self.description {
            Some(description) => Ok(description.clone()),
            None => Ok(TableDescription {
                table_name: table.to_owned(),
                status: TableStatus::Active,
                item_count: 0,
                size_bytes: 0,
                stream: None,
            }),
        }
    }

    async fn scan_page(
        &self,
        _table: &str,
        segment: Option<Segment>,
        start_key: Option<Item>,
    ) -> Result<ScanPage> {
        let index = segment.map(|segment| segment.index).unwrap_or(0);
        let items = self
            .segments
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .get(&index)
            .cloned()
            .unwrap_or_default();

        let offset = start_key
            .as_ref()
            .and_then(|key| key.get(CURSOR_ATTR))
            .and_then(|attr| match attr {
                AttributeValue::N(value) => value.parse::<usize>().ok(),
                _ => None,
            })
            .unwrap_or(0);

        let end = (offset + self.page_size).min(items.len());
        let page: Vec<Item> = items[offset..end].to_vec();

        let last_evaluated_key = (end < items.len()).then(|| {
            Item::from([(
                CURSOR_ATTR.to_owned(),
                AttributeValue::N(end.to_string()),
            )])
        });

        Ok(ScanPage {
            consumed_capacity: page.len() as f64,
            items: page,
            last_evaluated_key,
        })
    }

    async fn batch_put(&self, _table: &str, items: Vec<Item>) -> Result<BatchWriteOutput> {
        if let Some(code) = self
            .batch_error
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
        {
            return Err(anyhow::Error::new(AwsApiError::new(code, "batch rejected")));
        }

        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let consumed_capacity = items.len() as f64;

        let mut items = items;
        let mut unprocessed = Vec::new();
        let rounds = self.unprocessed_rounds.load(Ordering::SeqCst);
        if rounds > 0 && items.len() > 1 {
            self.unprocessed_rounds.store(rounds - 1, Ordering::SeqCst);
            if let Some(held_back) = items.pop() {
                unprocessed.push(held_back);
            }
        }

        for item in items {
            self.apply_put(item);
        }

        Ok(BatchWriteOutput {
            unprocessed,
            consumed_capacity,
        })
    }

    async fn put_item(&self, _table: &str, item: Item) -> Result<f64> {
        self.apply_put(item);
        Ok(1.0)
    }

    async fn delete_item(&self, _table: &str, key: Item) -> Result<f64> {
        let rendered = self.render_key(&key);
        self.delete_log
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(rendered.clone());
        self.store
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .remove(&rendered);
        Ok(1.0)
    }
}

/// A streams client that serves a fixed shard topology and scripted polls.
/// Each shard's script is a queue of `get_records` results; once a script
/// drains the shard closes (no next iterator).
#[derive(Debug, Default)]
pub struct MockStreamsClient {
    status: Option<StreamStatus>,
    shards: Mutex<Vec<Shard>>,
    scripts: Mutex<HashMap<String, VecDeque<Vec<StreamRecord>>>>,
    iterator_log: Mutex<Vec<String>>,
    describe_error: Mutex<Option<String>>,
}

impl MockStreamsClient {
    pub fn new() -> Self {
        Self {
            status: Some(StreamStatus::Enabled),
            ..Self::default()
        }
    }

    pub fn set_status(mut self, status: StreamStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn set_shard(self, shard: Shard, polls: Vec<Vec<StreamRecord>>) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .insert(shard.id().to_owned(), polls.into());
        self.shards
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(shard);
        self
    }

    pub fn set_describe_error<T: Into<String>>(self, code: T) -> Self {
        *self
            .describe_error
            .lock()
            .unwrap_or_else(|err| err.into_inner()) = Some(code.into());
        self
    }

    /// Shard ids in the order workers requested iterators for them.
    pub fn iterator_requests(&self) -> Vec<String> {
        self.iterator_log
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }
}

#[async_trait]
impl StreamsClient for MockStreamsClient {
    async fn describe_stream(&self, _stream_arn: &str) -> Result<StreamDescription> {
        if let Some(code) = self
            .describe_error
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
        {
            return Err(anyhow::Error::new(AwsApiError::new(
                code,
                "describe stream rejected",
            )));
        }

        Ok(StreamDescription {
            status: self.status.unwrap_or(StreamStatus::Unknown),
            shards: self
                .shards
                .lock()
                .unwrap_or_else(|err| err.into_inner())
                .clone(),
        })
    }

    async fn get_shard_iterator(
        &self,
        _stream_arn: &str,
        shard_id: &str,
    ) -> Result<Option<String>> {
        self.iterator_log
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(shard_id.to_owned());
        Ok(Some(format!("{shard_id}#0")))
    }

    async fn get_records(&self, iterator: &str) -> Result<GetRecordsOutput> {
        let shard_id = iterator.split('#').next().unwrap_or_default().to_owned();

        let mut scripts = self
            .scripts
            .lock()
            .unwrap_or_else(|err| err.into_inner());

        let Some(script) = scripts.get_mut(&shard_id) else {
            return Ok(GetRecordsOutput::default());
        };

        let records = script.pop_front().unwrap_or_default();
        let next_iterator = (!script.is_empty()).then(|| format!("{shard_id}#next"));

        Ok(GetRecordsOutput {
            records,
            next_iterator,
        })
    }
}
