//! AWS SDK implementations of the handler capabilities

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};

use super::{AlertPublisher, InventoryTable, ObjectReader, Page};
use crate::error::{FunctionError, Result};
use crate::inventory::{AttrValue, InventoryRecord, Item, STORE_ATTR};

pub struct S3Reader {
    client: aws_sdk_s3::Client,
}

impl S3Reader {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectReader for S3Reader {
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let read_error = |message: String| FunctionError::ObjectRead {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| read_error(DisplayErrorContext(&e).to_string()))?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| read_error(e.to_string()))?;
        Ok(bytes.into_bytes().to_vec())
    }
}

pub struct DynamoInventory {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoInventory {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn page(
        items: &[HashMap<String, AttributeValue>],
        last_key: Option<&HashMap<String, AttributeValue>>,
    ) -> Page {
        Page {
            items: items.iter().map(from_attribute_map).collect(),
            next: last_key.filter(|k| !k.is_empty()).map(from_attribute_map),
        }
    }
}

#[async_trait]
impl InventoryTable for DynamoInventory {
    async fn batch_put(&self, records: &[InventoryRecord]) -> Result<Vec<InventoryRecord>> {
        let requests = records
            .iter()
            .map(|record| -> Result<WriteRequest> {
                let put = PutRequest::builder()
                    .set_item(Some(to_attribute_map(&record.to_item())))
                    .build()
                    .map_err(|e| FunctionError::Table(e.to_string()))?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await
            .map_err(|e| FunctionError::Table(DisplayErrorContext(&e).to_string()))?;

        let unprocessed = output
            .unprocessed_items()
            .and_then(|items| items.get(&self.table_name))
            .map(|requests| {
                requests
                    .iter()
                    .filter_map(|r| r.put_request())
                    .map(|put| InventoryRecord::from_item(&from_attribute_map(put.item())))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();
        Ok(unprocessed)
    }

    async fn scan_page(&self, start: Option<Item>) -> Result<Page> {
        let output = self
            .client
            .scan()
            .table_name(&self.table_name)
            .set_exclusive_start_key(start.as_ref().map(to_attribute_map))
            .send()
            .await
            .map_err(|e| FunctionError::Table(DisplayErrorContext(&e).to_string()))?;
        Ok(Self::page(output.items(), output.last_evaluated_key()))
    }

    async fn query_page(&self, store: &str, start: Option<Item>) -> Result<Page> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("#store = :store")
            .expression_attribute_names("#store", STORE_ATTR)
            .expression_attribute_values(":store", AttributeValue::S(store.to_string()))
            .set_exclusive_start_key(start.as_ref().map(to_attribute_map))
            .send()
            .await
            .map_err(|e| FunctionError::Table(DisplayErrorContext(&e).to_string()))?;
        Ok(Self::page(output.items(), output.last_evaluated_key()))
    }
}

pub struct SnsPublisher {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsPublisher {
    pub fn new(client: aws_sdk_sns::Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl AlertPublisher for SnsPublisher {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| FunctionError::Publish(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

pub fn from_attribute(value: &AttributeValue) -> AttrValue {
    match value {
        AttributeValue::S(s) => AttrValue::String(s.clone()),
        AttributeValue::N(n) => AttrValue::Number(n.clone()),
        AttributeValue::Bool(b) => AttrValue::Bool(*b),
        AttributeValue::L(values) => AttrValue::List(values.iter().map(from_attribute).collect()),
        AttributeValue::M(map) => AttrValue::Map(from_attribute_map(map)),
        AttributeValue::Ss(values) => {
            AttrValue::List(values.iter().cloned().map(AttrValue::String).collect())
        }
        AttributeValue::Ns(values) => {
            AttrValue::List(values.iter().cloned().map(AttrValue::Number).collect())
        }
        // Binary values have no JSON rendering
        _ => AttrValue::Null,
    }
}

pub fn from_attribute_map(map: &HashMap<String, AttributeValue>) -> Item {
    map.iter()
        .map(|(k, v)| (k.clone(), from_attribute(v)))
        .collect()
}

pub fn to_attribute(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::String(s) => AttributeValue::S(s.clone()),
        AttrValue::Number(n) => AttributeValue::N(n.clone()),
        AttrValue::Bool(b) => AttributeValue::Bool(*b),
        AttrValue::Null => AttributeValue::Null(true),
        AttrValue::List(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        AttrValue::Map(map) => AttributeValue::M(to_attribute_map(map)),
    }
}

pub fn to_attribute_map(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect()
}
