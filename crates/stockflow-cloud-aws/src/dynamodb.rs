//! Key-value tables on DynamoDB

use crate::error::{classify, invalid};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
    StreamSpecification, StreamViewType, TableDescription,
};
use stockflow_cloud::provider::{KeyValueTables, TableDescriptor, TableSchema, TableStatus};
use stockflow_cloud::{CloudError, Result};

pub struct DynamoTables {
    client: Client,
}

impl DynamoTables {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl KeyValueTables for DynamoTables {
    async fn create_table(&self, name: &str, schema: &TableSchema) -> Result<TableDescriptor> {
        let attribute = |name: &str| {
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(invalid)
        };
        let key = |name: &str, key_type| {
            KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .map_err(invalid)
        };
        let stream = StreamSpecification::builder()
            .stream_enabled(schema.stream_new_images)
            .set_stream_view_type(schema.stream_new_images.then_some(StreamViewType::NewImage))
            .build()
            .map_err(invalid)?;

        let output = self
            .client
            .create_table()
            .table_name(name)
            .attribute_definitions(attribute(&schema.partition_key)?)
            .attribute_definitions(attribute(&schema.sort_key)?)
            .key_schema(key(&schema.partition_key, KeyType::Hash)?)
            .key_schema(key(&schema.sort_key, KeyType::Range)?)
            .billing_mode(BillingMode::PayPerRequest)
            .stream_specification(stream)
            .send()
            .await
            .map_err(|e| classify(e, name))?;

        let table = output
            .table_description()
            .ok_or_else(|| CloudError::ApiError(format!("no description returned for {}", name)))?;
        Ok(descriptor(name, table))
    }

    async fn describe_table(&self, name: &str) -> Result<TableDescriptor> {
        let output = self
            .client
            .describe_table()
            .table_name(name)
            .send()
            .await
            .map_err(|e| classify(e, name))?;

        let table = output
            .table()
            .ok_or_else(|| CloudError::NotFound(name.to_string()))?;
        Ok(descriptor(name, table))
    }

    async fn delete_table(&self, name: &str) -> Result<()> {
        match self.client.delete_table().table_name(name).send().await {
            Ok(_) => Ok(()),
            Err(e) => Err(match classify(e, name) {
                // Raised while the table is still being created or updated
                CloudError::AlreadyExists(_) => {
                    CloudError::ApiError(format!("table {} is busy; retry later", name))
                }
                other => other,
            }),
        }
    }
}

fn descriptor(name: &str, table: &TableDescription) -> TableDescriptor {
    use aws_sdk_dynamodb::types::TableStatus as Status;

    let status = match table.table_status() {
        Some(Status::Active) => TableStatus::Active,
        Some(Status::Creating) => TableStatus::Creating,
        Some(Status::Updating) => TableStatus::Updating,
        Some(Status::Deleting) => TableStatus::Deleting,
        Some(other) => TableStatus::Other(other.as_str().to_string()),
        None => TableStatus::Other("unknown".to_string()),
    };

    TableDescriptor {
        name: table.table_name().unwrap_or(name).to_string(),
        arn: table.table_arn().unwrap_or_default().to_string(),
        stream_arn: table.latest_stream_arn().map(str::to_string),
        status,
    }
}
