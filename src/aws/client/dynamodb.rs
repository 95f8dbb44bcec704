use super::{
    api_error, BatchWriteOutput, ScanPage, Segment, StreamSpec, TableClient, TableDescription,
};
use crate::types::{Item, StreamViewType, TableStatus};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{PutRequest, ReturnConsumedCapacity, WriteRequest};
use aws_sdk_dynamodb::Client;

#[derive(Debug, Clone)]
pub struct DynamodbTableClient {
    client: Client,
}

impl DynamodbTableClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TableClient for DynamodbTableClient {
    async fn describe_table(&self, table: &str) -> Result<TableDescription> {
        let output = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(api_error)?;

        let description = output
            .table
            .ok_or(anyhow!("`table` is None in `DescribeTableOutput`"))?;

        let arn = description.latest_stream_arn;
        let stream = description.stream_specification.map(|spec| StreamSpec {
            enabled: spec.stream_enabled,
            view_type: spec
                .stream_view_type
                .map(StreamViewType::from)
                .unwrap_or(StreamViewType::Unknown),
            arn,
        });

        Ok(TableDescription {
            table_name: description.table_name.unwrap_or_else(|| table.to_owned()),
            status: description
                .table_status
                .map(TableStatus::from)
                .unwrap_or(TableStatus::Unknown),
            item_count: description.item_count.unwrap_or_default(),
            size_bytes: description.table_size_bytes.unwrap_or_default(),
            stream,
        })
    }

    async fn scan_page(
        &self,
        table: &str,
        segment: Option<Segment>,
        start_key: Option<Item>,
    ) -> Result<ScanPage> {
        let mut request = self
            .client
            .scan()
            .table_name(table)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .set_exclusive_start_key(start_key);

        if let Some(segment) = segment {
            request = request.segment(segment.index).total_segments(segment.total);
        }

        let output = request.send().await.map_err(api_error)?;

        Ok(ScanPage {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: output.last_evaluated_key,
            consumed_capacity: output
                .consumed_capacity
                .and_then(|capacity| capacity.capacity_units)
                .unwrap_or_default(),
        })
    }

    async fn batch_put(&self, table: &str, items: Vec<Item>) -> Result<BatchWriteOutput> {
        let requests = items
            .into_iter()
            .map(|item| {
                let put = PutRequest::builder().set_item(Some(item)).build()?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<WriteRequest>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(api_error)?;

        let unprocessed = output
            .unprocessed_items
            .unwrap_or_default()
            .remove(table)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|request| request.put_request.map(|put| put.item))
            .collect();

        let consumed_capacity = output
            .consumed_capacity
            .unwrap_or_default()
            .into_iter()
            .filter_map(|capacity| capacity.capacity_units)
            .sum();

        Ok(BatchWriteOutput {
            unprocessed,
            consumed_capacity,
        })
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<f64> {
        let output = self
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(api_error)?;

        Ok(output
            .consumed_capacity
            .and_then(|capacity| capacity.capacity_units)
            .unwrap_or_default())
    }

    async fn delete_item(&self, table: &str, key: Item) -> Result<f64> {
        let output = self
            .client
            .delete_item()
            .table_name(table)
            .set_key(Some(key))
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(api_error)?;

        Ok(output
            .consumed_capacity
            .and_then(|capacity| capacity.capacity_units)
            .unwrap_or_default())
    }
}
