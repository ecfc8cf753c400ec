//! Object storage on S3

use crate::error::{classify, invalid};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ErrorDocument, Event, FilterRule,
    FilterRuleName, IndexDocument, LambdaFunctionConfiguration, NotificationConfiguration,
    NotificationConfigurationFilter, ObjectIdentifier, PublicAccessBlockConfiguration, S3KeyFilter,
    WebsiteConfiguration,
};
use stockflow_cloud::provider::{BucketDescriptor, ObjectStorage};
use stockflow_cloud::{CloudError, Result};

/// Largest batch `DeleteObjects` accepts
const DELETE_BATCH: usize = 1000;

const INDEX_DOCUMENT: &str = "index.html";

pub struct S3Storage {
    client: Client,
    region: String,
}

impl S3Storage {
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    fn website_url(&self, bucket: &str) -> String {
        format!("http://{}.s3-website.{}.amazonaws.com", bucket, self.region)
    }

    async fn delete_batch(&self, bucket: &str, objects: Vec<ObjectIdentifier>) -> Result<usize> {
        let mut removed = 0;
        for chunk in objects.chunks(DELETE_BATCH) {
            let delete = Delete::builder()
                .set_objects(Some(chunk.to_vec()))
                .quiet(true)
                .build()
                .map_err(invalid)?;
            let output = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| classify(e, bucket))?;

            if let Some(failed) = output.errors().first() {
                return Err(CloudError::ApiError(format!(
                    "could not delete {} from {}: {}",
                    failed.key().unwrap_or("?"),
                    bucket,
                    failed.message().unwrap_or("unknown error")
                )));
            }
            removed += chunk.len();
        }
        Ok(removed)
    }

    /// Whether `bucket` exists and this account can reach it. A bucket owned
    /// elsewhere reads as absent so that create reports the name as taken.
    async fn owned(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match classify(e, bucket) {
                CloudError::NotFound(_) => Ok(false),
                CloudError::ApiError(message) => {
                    tracing::debug!("head {} failed, trying create: {}", bucket, message);
                    Ok(false)
                }
                other => Err(other),
            },
        }
    }

    /// Every object version and delete marker
    async fn list_versions(&self, bucket: &str) -> Result<Vec<ObjectIdentifier>> {
        let mut identifiers = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_object_versions()
                .bucket(bucket)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_marker.take())
                .send()
                .await
                .map_err(|e| classify(e, bucket))?;

            let versions = output.versions().iter().map(|v| (v.key(), v.version_id()));
            let markers = output
                .delete_markers()
                .iter()
                .map(|m| (m.key(), m.version_id()));
            for (key, version) in versions.chain(markers) {
                if let Some(key) = key {
                    let identifier = ObjectIdentifier::builder()
                        .key(key)
                        .set_version_id(version.map(str::to_string))
                        .build()
                        .map_err(invalid)?;
                    identifiers.push(identifier);
                }
            }

            if output.is_truncated() != Some(true) {
                break;
            }
            key_marker = output.next_key_marker().map(str::to_string);
            version_marker = output.next_version_id_marker().map(str::to_string);
        }

        Ok(identifiers)
    }

    /// Current objects
    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectIdentifier>> {
        let mut identifiers = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify(e, bucket))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    identifiers.push(ObjectIdentifier::builder().key(key).build().map_err(invalid)?);
                }
            }
        }

        Ok(identifiers)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn create_bucket(&self, name: &str) -> Result<BucketDescriptor> {
        // us-east-1 answers 200 when the caller already owns the bucket
        if self.owned(name).await? {
            return Err(CloudError::AlreadyExists(name.to_string()));
        }

        let mut request = self.client.create_bucket().bucket(name);
        // us-east-1 rejects an explicit location constraint
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request.send().await.map_err(|e| classify(e, name))?;
        Ok(BucketDescriptor::new(name))
    }

    async fn describe_bucket(&self, name: &str) -> Result<BucketDescriptor> {
        self.client
            .head_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(|e| classify(e, name))?;
        Ok(BucketDescriptor::new(name))
    }

    async fn configure_website(&self, name: &str) -> Result<String> {
        self.client
            .put_public_access_block()
            .bucket(name)
            .public_access_block_configuration(
                PublicAccessBlockConfiguration::builder()
                    .block_public_acls(false)
                    .ignore_public_acls(false)
                    .block_public_policy(false)
                    .restrict_public_buckets(false)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify(e, name))?;

        self.client
            .put_bucket_policy()
            .bucket(name)
            .policy(public_read_policy(name))
            .send()
            .await
            .map_err(|e| classify(e, name))?;

        let website = WebsiteConfiguration::builder()
            .index_document(IndexDocument::builder().suffix(INDEX_DOCUMENT).build().map_err(invalid)?)
            .error_document(ErrorDocument::builder().key(INDEX_DOCUMENT).build().map_err(invalid)?)
            .build();
        self.client
            .put_bucket_website()
            .bucket(name)
            .website_configuration(website)
            .send()
            .await
            .map_err(|e| classify(e, name))?;

        Ok(self.website_url(name))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;
        Ok(())
    }

    async fn set_upload_notification(&self, bucket: &str, function_arn: &str, suffix: &str) -> Result<()> {
        let filter = NotificationConfigurationFilter::builder()
            .key(
                S3KeyFilter::builder()
                    .filter_rules(
                        FilterRule::builder()
                            .name(FilterRuleName::Suffix)
                            .value(suffix)
                            .build(),
                    )
                    .build(),
            )
            .build();
        let target = LambdaFunctionConfiguration::builder()
            .lambda_function_arn(function_arn)
            .events(Event::from("s3:ObjectCreated:*"))
            .filter(filter)
            .build()
            .map_err(invalid)?;

        self.client
            .put_bucket_notification_configuration()
            .bucket(bucket)
            .notification_configuration(
                NotificationConfiguration::builder()
                    .lambda_function_configurations(target)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify(e, bucket))?;
        Ok(())
    }

    async fn empty_bucket(&self, name: &str) -> Result<usize> {
        let versions = self.list_versions(name).await?;
        let mut removed = self.delete_batch(name, versions).await?;

        let current = self.list_objects(name).await?;
        removed += self.delete_batch(name, current).await?;

        Ok(removed)
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        self.client
            .delete_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(|e| classify(e, name))?;
        Ok(())
    }
}

fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "PublicReadGetObject",
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{}/*", bucket),
        }]
    })
    .to_string()
}
