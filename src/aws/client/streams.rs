use super::{api_error, GetRecordsOutput, StreamDescription, StreamsClient};
use crate::shards::Shard;
use crate::types::{StreamRecord, StreamStatus};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_dynamodbstreams::types::ShardIteratorType;
use aws_sdk_dynamodbstreams::Client;

const GET_RECORDS_LIMIT: i32 = 1000;

#[derive(Debug, Clone)]
pub struct DynamodbStreamsClient {
    client: Client,
}

impl DynamodbStreamsClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamsClient for DynamodbStreamsClient {
    async fn describe_stream(&self, stream_arn: &str) -> Result<StreamDescription> {
        let output = self
            .client
            .describe_stream()
            .stream_arn(stream_arn)
            .send()
            .await
            .map_err(api_error)?;

        let description = output.stream_description.ok_or(anyhow!(
            "`stream_description` is None in `DescribeStreamOutput`"
        ))?;

        let shards = description
            .shards
            .unwrap_or_default()
            .into_iter()
            .filter_map(|shard| {
                let parent = shard.parent_shard_id;
                shard.shard_id.map(|id| Shard::new(id.as_str(), parent))
            })
            .collect();

        Ok(StreamDescription {
            status: description
                .stream_status
                .map(StreamStatus::from)
                .unwrap_or(StreamStatus::Unknown),
            shards,
        })
    }

    async fn get_shard_iterator(
        &self,
        stream_arn: &str,
        shard_id: &str,
    ) -> Result<Option<String>> {
        self.client
            .get_shard_iterator()
            .stream_arn(stream_arn)
            .shard_id(shard_id)
            .shard_iterator_type(ShardIteratorType::TrimHorizon)
            .send()
            .await
            .map(|output| output.shard_iterator)
            .map_err(|err| api_error(err))
    }

    async fn get_records(&self, iterator: &str) -> Result<GetRecordsOutput> {
        let output = self
            .client
            .get_records()
            .shard_iterator(iterator)
            .limit(GET_RECORDS_LIMIT)
            .send()
            .await
            .map_err(api_error)?;

        Ok(GetRecordsOutput {
            records: output
                .records
                .unwrap_or_default()
                .into_iter()
                .map(StreamRecord::from)
                .collect(),
            next_iterator: output.next_shard_iterator,
        })
    }
}
