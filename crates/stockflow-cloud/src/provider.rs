//! Platform collaborator traits
//!
//! Each managed service is reached through one of these traits. The engines
//! only ever see the traits, so a real platform adapter and an in-memory fake
//! are interchangeable.
//!
//! Implementations must report conflicts as [`CloudError::AlreadyExists`] and
//! missing resources as [`CloudError::NotFound`], including for services whose
//! native API silently accepts duplicates (the adapter checks first).
//!
//! [`CloudError::AlreadyExists`]: crate::CloudError::AlreadyExists
//! [`CloudError::NotFound`]: crate::CloudError::NotFound

use crate::error::Result;
use crate::naming::ResourceKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Object storage (buckets and objects)
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Create a private bucket in the configured region
    async fn create_bucket(&self, name: &str) -> Result<BucketDescriptor>;

    /// Fetch an existing bucket
    async fn describe_bucket(&self, name: &str) -> Result<BucketDescriptor>;

    /// Make the bucket publicly readable and serve it as a static website.
    /// Returns the website URL.
    async fn configure_website(&self, name: &str) -> Result<String>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;

    /// Invoke `function_arn` for every created object whose key ends with `suffix`.
    /// Replaces the bucket's notification configuration.
    async fn set_upload_notification(
        &self,
        bucket: &str,
        function_arn: &str,
        suffix: &str,
    ) -> Result<()>;

    /// Delete every object version, delete marker and current object.
    /// Returns the number of entries removed.
    async fn empty_bucket(&self, name: &str) -> Result<usize>;

    async fn delete_bucket(&self, name: &str) -> Result<()>;
}

/// Key-value tables with change streams
#[async_trait]
pub trait KeyValueTables: Send + Sync {
    async fn create_table(&self, name: &str, schema: &TableSchema) -> Result<TableDescriptor>;

    async fn describe_table(&self, name: &str) -> Result<TableDescriptor>;

    async fn delete_table(&self, name: &str) -> Result<()>;
}

/// Notification topics
#[async_trait]
pub trait Topics: Send + Sync {
    /// Create a topic and return its identifier
    async fn create_topic(&self, name: &str) -> Result<String>;

    /// Identifier of an existing topic
    async fn describe_topic(&self, name: &str) -> Result<String>;

    /// Subscribe an email endpoint and return the subscription identifier
    async fn subscribe_email(&self, topic_arn: &str, email: &str) -> Result<String>;

    async fn delete_topic(&self, topic_arn: &str) -> Result<()>;
}

/// Request-driven functions, their permissions and event-source bindings
#[async_trait]
pub trait Functions: Send + Sync {
    async fn create_function(&self, config: &FunctionConfig) -> Result<FunctionDescriptor>;

    /// Replace code and configuration of an existing function
    async fn update_function(&self, config: &FunctionConfig) -> Result<FunctionDescriptor>;

    async fn get_function(&self, name: &str) -> Result<FunctionDescriptor>;

    async fn delete_function(&self, name: &str) -> Result<()>;

    /// Allow a service principal to invoke a function
    async fn add_permission(&self, grant: &PermissionGrant) -> Result<()>;

    /// Bind a change stream to a function. Returns the binding identifier.
    async fn create_event_source_mapping(
        &self,
        function_name: &str,
        source_arn: &str,
        settings: &StreamSettings,
    ) -> Result<String>;

    async fn list_event_source_mappings(&self, function_name: &str) -> Result<Vec<String>>;

    async fn delete_event_source_mapping(&self, mapping_id: &str) -> Result<()>;
}

/// HTTP API gateway
#[async_trait]
pub trait HttpGateway: Send + Sync {
    async fn create_api(&self, name: &str, cors: &CorsPolicy) -> Result<ApiDescriptor>;

    async fn find_api(&self, name: &str) -> Result<Option<ApiDescriptor>>;

    /// Existing proxy integration targeting `function_arn`
    async fn find_integration(&self, api_id: &str, function_arn: &str) -> Result<Option<String>>;

    /// Create a proxy integration and return its identifier
    async fn create_integration(&self, api_id: &str, function_arn: &str) -> Result<String>;

    async fn create_route(&self, api_id: &str, route_key: &str, integration_id: &str)
    -> Result<()>;

    async fn create_stage(&self, api_id: &str, stage: &str, auto_deploy: bool) -> Result<()>;

    async fn update_stage(&self, api_id: &str, stage: &str, auto_deploy: bool) -> Result<()>;

    async fn delete_api(&self, api_id: &str) -> Result<()>;
}

/// Produces the deployable archive of a function
pub trait FunctionSource: Send + Sync {
    fn archive(&self, kind: ResourceKind, function_name: &str) -> Result<Vec<u8>>;
}

/// The full set of collaborators an engine works against
#[derive(Clone)]
pub struct Services {
    pub storage: Arc<dyn ObjectStorage>,
    pub tables: Arc<dyn KeyValueTables>,
    pub topics: Arc<dyn Topics>,
    pub functions: Arc<dyn Functions>,
    pub gateway: Arc<dyn HttpGateway>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDescriptor {
    pub name: String,
    pub arn: String,
}

impl BucketDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            arn: format!("arn:aws:s3:::{}", name),
            name,
        }
    }
}

/// Key layout and change-stream setting of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub partition_key: String,
    pub sort_key: String,
    /// Emit post-change row images on the change stream
    pub stream_new_images: bool,
}

impl TableSchema {
    /// `Store` / `Item` string keys with a post-image change stream
    pub fn inventory() -> Self {
        Self {
            partition_key: "Store".to_string(),
            sort_key: "Item".to_string(),
            stream_new_images: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub arn: String,
    pub stream_arn: Option<String>,
    pub status: TableStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Creating,
    Active,
    Updating,
    Deleting,
    Other(String),
}

/// Desired configuration of a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionConfig {
    pub name: String,
    pub role_arn: String,
    pub runtime: String,
    pub handler: String,
    pub timeout_secs: i32,
    pub memory_mb: i32,
    pub environment: BTreeMap<String, String>,
    pub archive: Vec<u8>,
}

impl FunctionConfig {
    /// Custom-runtime function with the stack's default limits
    pub fn new(name: impl Into<String>, role_arn: impl Into<String>, archive: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            role_arn: role_arn.into(),
            runtime: "provided.al2023".to_string(),
            handler: "bootstrap".to_string(),
            timeout_secs: 30,
            memory_mb: 128,
            environment: BTreeMap::new(),
            archive,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub arn: String,
    pub state: FunctionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionState {
    Pending,
    /// Ready to invoke; no update in flight
    Active,
    /// An update is still being applied
    Updating,
    Inactive,
    Failed(String),
}

/// Permission for a service principal to invoke a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub function_name: String,
    pub statement_id: String,
    pub principal: String,
    pub source_arn: String,
    pub source_account: Option<String>,
}

/// Change-stream consumption settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    pub batch_size: i32,
    /// Start from the newest record instead of the oldest
    pub start_at_latest: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            start_at_latest: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
    pub id: String,
    pub name: String,
    pub endpoint: String,
}

/// Cross-origin policy of the HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsPolicy {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".to_string()],
            allow_methods: vec!["GET".to_string(), "OPTIONS".to_string()],
            allow_headers: vec!["Content-Type".to_string()],
        }
    }
}
