//! Resource naming
//!
//! Every managed resource name is derived from a single operator prefix.
//! Names are pure functions of `(prefix, kind)`, so deploy and teardown
//! address the same resources without sharing any state.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest prefix that keeps every derived name inside platform limits
/// (63 characters for bucket names, 64 for function names).
pub const MAX_PREFIX_LEN: usize = 45;

/// Validated operator prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);

impl Prefix {
    /// Validate a raw prefix against the bucket naming rules, which are the
    /// strictest of all derived resources.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();

        if raw.is_empty() {
            return Err(CloudError::InvalidConfig(
                "prefix must not be empty".to_string(),
            ));
        }
        if raw.len() > MAX_PREFIX_LEN {
            return Err(CloudError::InvalidConfig(format!(
                "prefix '{}' is {} characters long; the maximum is {}",
                raw,
                raw.len(),
                MAX_PREFIX_LEN
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(CloudError::InvalidConfig(format!(
                "prefix '{}' contains '{}'; only lowercase letters, digits and '-' are allowed",
                raw, bad
            )));
        }
        if raw.starts_with('-') || raw.ends_with('-') {
            return Err(CloudError::InvalidConfig(format!(
                "prefix '{}' must start and end with a letter or digit",
                raw
            )));
        }
        if raw.starts_with("xn--") {
            return Err(CloudError::InvalidConfig(format!(
                "prefix '{}' must not start with the reserved 'xn--'",
                raw
            )));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the platform name of a managed resource
    pub fn name(&self, kind: ResourceKind) -> String {
        format!("{}-{}", self.0, kind.suffix())
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Prefix {
    type Error = CloudError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.0
    }
}

/// Broad resource class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceCategory {
    StorageBucket,
    KeyValueTable,
    Topic,
    Function,
    HttpApi,
    TriggerBinding,
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceCategory::StorageBucket => write!(f, "storage-bucket"),
            ResourceCategory::KeyValueTable => write!(f, "key-value-table"),
            ResourceCategory::Topic => write!(f, "topic"),
            ResourceCategory::Function => write!(f, "function"),
            ResourceCategory::HttpApi => write!(f, "http-api"),
            ResourceCategory::TriggerBinding => write!(f, "trigger-binding"),
        }
    }
}

/// Every resource the stack manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    UploadBucket,
    WebBucket,
    InventoryTable,
    NoStockTopic,
    EmailSubscription,
    LoaderFunction,
    QueryFunction,
    NotifyFunction,
    InventoryApi,
    UploadTrigger,
    StreamTrigger,
    ApiInvokeGrant,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 12] = [
        ResourceKind::UploadBucket,
        ResourceKind::WebBucket,
        ResourceKind::InventoryTable,
        ResourceKind::NoStockTopic,
        ResourceKind::EmailSubscription,
        ResourceKind::LoaderFunction,
        ResourceKind::QueryFunction,
        ResourceKind::NotifyFunction,
        ResourceKind::InventoryApi,
        ResourceKind::UploadTrigger,
        ResourceKind::StreamTrigger,
        ResourceKind::ApiInvokeGrant,
    ];

    fn suffix(self) -> &'static str {
        match self {
            ResourceKind::UploadBucket => "inventory-uploads",
            ResourceKind::WebBucket => "inventory-web",
            ResourceKind::InventoryTable => "Inventory",
            ResourceKind::NoStockTopic => "NoStock",
            ResourceKind::EmailSubscription => "NoStock-email",
            ResourceKind::LoaderFunction => "load_inventory",
            ResourceKind::QueryFunction => "get_inventory_api",
            ResourceKind::NotifyFunction => "notify_low_stock",
            ResourceKind::InventoryApi => "InventoryAPI",
            ResourceKind::UploadTrigger => "upload-trigger",
            ResourceKind::StreamTrigger => "stream-trigger",
            ResourceKind::ApiInvokeGrant => "api-invoke",
        }
    }

    pub fn category(self) -> ResourceCategory {
        match self {
            ResourceKind::UploadBucket | ResourceKind::WebBucket => ResourceCategory::StorageBucket,
            ResourceKind::InventoryTable => ResourceCategory::KeyValueTable,
            ResourceKind::NoStockTopic => ResourceCategory::Topic,
            ResourceKind::LoaderFunction
            | ResourceKind::QueryFunction
            | ResourceKind::NotifyFunction => ResourceCategory::Function,
            ResourceKind::InventoryApi => ResourceCategory::HttpApi,
            ResourceKind::EmailSubscription
            | ResourceKind::UploadTrigger
            | ResourceKind::StreamTrigger
            | ResourceKind::ApiInvokeGrant => ResourceCategory::TriggerBinding,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::UploadBucket => "upload bucket",
            ResourceKind::WebBucket => "web bucket",
            ResourceKind::InventoryTable => "inventory table",
            ResourceKind::NoStockTopic => "low-stock topic",
            ResourceKind::EmailSubscription => "email subscription",
            ResourceKind::LoaderFunction => "loader function",
            ResourceKind::QueryFunction => "query function",
            ResourceKind::NotifyFunction => "notifier function",
            ResourceKind::InventoryApi => "inventory API",
            ResourceKind::UploadTrigger => "upload trigger",
            ResourceKind::StreamTrigger => "change-stream trigger",
            ResourceKind::ApiInvokeGrant => "API invoke grant",
        };
        f.write_str(label)
    }
}
