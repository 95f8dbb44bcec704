mod dynamodb;
mod mock;
mod streams;

pub use dynamodb::DynamodbTableClient;
pub use mock::{MockStreamsClient, MockTableClient};
pub use streams::DynamodbStreamsClient;

use crate::error::AwsApiError;
use crate::shards::Shard;
use crate::types::{Item, StreamRecord, StreamStatus, StreamViewType, TableStatus};

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// One parallel-scan slice: this worker reads segment `index` of `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub index: i32,
    pub total: i32,
}

#[derive(Debug, Clone)]
pub struct TableDescription {
    pub table_name: String,
    pub status: TableStatus,
    pub item_count: i64,
    pub size_bytes: i64,
    pub stream: Option<StreamSpec>,
}

#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub enabled: bool,
    pub view_type: StreamViewType,
    pub arn: Option<String>,
}

#[derive(Debug, Default)]
pub struct ScanPage {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
    pub consumed_capacity: f64,
}

#[derive(Debug, Default)]
pub struct BatchWriteOutput {
    pub unprocessed: Vec<Item>,
    pub consumed_capacity: f64,
}

#[derive(Debug)]
pub struct StreamDescription {
    pub status: StreamStatus,
    pub shards: Vec<Shard>,
}

#[derive(Debug, Default)]
pub struct GetRecordsOutput {
    pub records: Vec<StreamRecord>,
    pub next_iterator: Option<String>,
}

/// DynamoDB table operations used by the pipeline. Writes request `TOTAL`
/// consumed capacity so throughput trackers can be fed from responses.
#[async_trait]
pub trait TableClient: Send + Sync {
    async fn describe_table(&self, table: &str) -> Result<TableDescription>;

    async fn scan_page(
        &self,
        table: &str,
        segment: Option<Segment>,
        start_key: Option<Item>,
    ) -> Result<ScanPage>;

    async fn batch_put(&self, table: &str, items: Vec<Item>) -> Result<BatchWriteOutput>;

    async fn put_item(&self, table: &str, item: Item) -> Result<f64>;

    async fn delete_item(&self, table: &str, key: Item) -> Result<f64>;
}

/// DynamoDB Streams operations used by the shard watcher and workers.
#[async_trait]
pub trait StreamsClient: Send + Sync {
    async fn describe_stream(&self, stream_arn: &str) -> Result<StreamDescription>;

    /// Obtain a `TRIM_HORIZON` iterator for the shard, or `None` when the
    /// shard has already been trimmed away.
    async fn get_shard_iterator(&self, stream_arn: &str, shard_id: &str)
        -> Result<Option<String>>;

    async fn get_records(&self, iterator: &str) -> Result<GetRecordsOutput>;
}

/// Wrap an SDK failure, preserving the service error code for callers that
/// branch on it (`ResourceNotFoundException`, `RequestCanceled`, ...).
pub(crate) fn api_error<E, R>(err: SdkError<E, R>) -> anyhow::Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let code = err.code().unwrap_or("Unknown").to_owned();
    let message = DisplayErrorContext(&err).to_string();
    anyhow::Error::new(AwsApiError::new(code, message))
}
