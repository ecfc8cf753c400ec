//! AWS adapters for StockFlow
//!
//! Implements the `stockflow-cloud` collaborator traits on the AWS SDK:
//!
//! - S3 for the upload and website buckets
//! - DynamoDB for the inventory table and its change stream
//! - SNS for the low-stock topic and the email subscription
//! - Lambda for the three functions, their permissions and stream mappings
//! - API Gateway v2 for the HTTP API
//!
//! Credentials come from the default provider chain (environment, profile,
//! instance role).
//!
//! # Example
//!
//! ```ignore
//! use stockflow_cloud_aws::AwsServices;
//!
//! let services = AwsServices::load("eu-west-1", "111122223333").await;
//! let report = Provisioner::new(&services, RetryConfig::default())
//!     .provision_all(&plan, &archives)
//!     .await;
//! ```

pub mod apigateway;
pub mod dynamodb;
pub mod error;
pub mod lambda;
pub mod package;
pub mod s3;
pub mod sns;

pub use apigateway::ApiGateway;
pub use dynamodb::DynamoTables;
pub use error::AwsError;
pub use lambda::LambdaFunctions;
pub use package::ZipPackager;
pub use s3::S3Storage;
pub use sns::SnsTopics;

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use stockflow_cloud::{RetryConfig, Services};

/// Builds the AWS-backed [`Services`]
pub struct AwsServices;

impl AwsServices {
    /// Load the shared SDK config for `region` and build every adapter
    pub async fn load(region: &str, account_id: &str) -> Services {
        Self::load_with_retry(region, account_id, RetryConfig::default()).await
    }

    pub async fn load_with_retry(region: &str, account_id: &str, retry: RetryConfig) -> Services {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        tracing::debug!("Loaded AWS config for {}", region);

        Services {
            storage: Arc::new(S3Storage::new(aws_sdk_s3::Client::new(&config), region)),
            tables: Arc::new(DynamoTables::new(aws_sdk_dynamodb::Client::new(&config))),
            topics: Arc::new(SnsTopics::new(
                aws_sdk_sns::Client::new(&config),
                region,
                account_id,
            )),
            functions: Arc::new(LambdaFunctions::new(
                aws_sdk_lambda::Client::new(&config),
                retry,
            )),
            gateway: Arc::new(ApiGateway::new(
                aws_sdk_apigatewayv2::Client::new(&config),
                region,
            )),
        }
    }
}
